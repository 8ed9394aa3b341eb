//! Decoded RGB frame built from uploaded image bytes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has zero width or height")]
    Empty,
    #[error("invalid RGB buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// A decoded image in packed RGB8 layout (`width * height * 3` bytes).
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Decode an encoded image (JPEG, PNG, ...) from memory into RGB8.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(FrameError::Empty);
        }
        Ok(Self {
            data: rgb.into_raw(),
            width,
            height,
        })
    }

    /// Wrap an existing packed RGB8 buffer.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty);
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// RGB triple at (x, y). Caller guarantees bounds.
    #[inline]
    pub(crate) fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let off = (y * self.width as usize + x) * 3;
        [self.data[off], self.data[off + 1], self.data[off + 2]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let bytes = encode_png(4, 3, [10, 20, 30]);
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.data.len(), 4 * 3 * 3);
        assert_eq!(frame.pixel(3, 2), [10, 20, 30]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = Frame::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }

    #[test]
    fn test_from_rgb_length_check() {
        let err = Frame::from_rgb(vec![0; 10], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidLength { expected: 12, actual: 10 }
        ));
        assert!(Frame::from_rgb(vec![0; 12], 2, 2).is_ok());
    }

    #[test]
    fn test_from_rgb_empty() {
        assert!(matches!(Frame::from_rgb(vec![], 0, 5), Err(FrameError::Empty)));
    }
}
