//! vigia-core: face detection and embedding engine.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime for CPU inference. Callers that only need
//! embeddings go through the [`FaceEncoder`] trait.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod frame;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use detector::FaceDetector;
pub use encoder::{EncoderError, FaceEncoder, FaceEncoding, OnnxFaceEncoder};
pub use frame::{Frame, FrameError};
pub use recognizer::FaceRecognizer;
pub use types::{BoundingBox, Embedding, EuclideanMatcher, KnownFace, MatchResult, Matcher};

/// Default directory for ONNX model files.
///
/// `$VIGIA_MODEL_DIR`, else `$XDG_DATA_HOME/vigia/models`, else
/// `$HOME/.local/share/vigia/models`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VIGIA_MODEL_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("vigia")
        .join("models")
}
