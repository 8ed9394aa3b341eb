//! Uploaded photo handling: file name normalization and type checks.

/// One file part of a multipart request.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name, untouched.
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRejection {
    NotAnImage,
    NotJpeg,
}

impl Upload {
    /// Lower-cased final path component of the client file name.
    ///
    /// Both `/` and `\` count as separators so a crafted name cannot escape
    /// the photo directory.
    pub fn base_name(&self) -> String {
        self.file_name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }

    /// Accept only `image/*` uploads named `.jpg` or `.jpeg`.
    pub fn validate(&self) -> Result<(), UploadRejection> {
        let is_image = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(UploadRejection::NotAnImage);
        }

        let name = self.base_name();
        if name.ends_with(".jpg") || name.ends_with(".jpeg") {
            Ok(())
        } else {
            Err(UploadRejection::NotJpeg)
        }
    }
}
