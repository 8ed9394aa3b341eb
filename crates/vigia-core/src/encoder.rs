//! Face encoding seam: image frame in, one embedding per detected face out.

use crate::detector::{DetectorError, FaceDetector};
use crate::frame::Frame;
use crate::recognizer::{FaceRecognizer, RecognizerError, ARCFACE_MODEL_VERSION};
use crate::types::{BoundingBox, Embedding};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// A detected face together with its embedding.
#[derive(Debug, Clone)]
pub struct FaceEncoding {
    pub face: BoundingBox,
    pub embedding: Embedding,
}

/// Anything that can turn a frame into face embeddings.
///
/// Results are ordered by descending detection confidence.
pub trait FaceEncoder: Send {
    fn encode_faces(&mut self, frame: &Frame) -> Result<Vec<FaceEncoding>, EncoderError>;

    /// Version tag of the embedding model, recorded alongside stored encodings.
    fn model_version(&self) -> Option<&str> {
        None
    }
}

/// SCRFD detection followed by ArcFace embedding.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    pub fn load(scrfd_path: &str, arcface_path: &str) -> Result<Self, EncoderError> {
        let detector = FaceDetector::load(scrfd_path)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self {
            detector,
            recognizer,
        })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode_faces(&mut self, frame: &Frame) -> Result<Vec<FaceEncoding>, EncoderError> {
        let faces = self.detector.detect(frame)?;
        let mut encodings = Vec::with_capacity(faces.len());

        for face in faces {
            if face.landmarks.is_none() {
                tracing::debug!(confidence = face.confidence, "skipping face without landmarks");
                continue;
            }
            let embedding = self.recognizer.extract(frame, &face)?;
            encodings.push(FaceEncoding { face, embedding });
        }

        Ok(encodings)
    }

    fn model_version(&self) -> Option<&str> {
        Some(ARCFACE_MODEL_VERSION)
    }
}
