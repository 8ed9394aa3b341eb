use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use vigia_core::{EncoderError, Embedding, FaceEncoder, Frame, FrameError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("image error: {0}")]
    Frame(#[from] FrameError),
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    EncodeAll {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<Vec<Embedding>, EngineError>>,
    },
    EncodeBest {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<Option<Embedding>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    model_version: Option<String>,
}

impl EngineHandle {
    /// Decode an uploaded image and embed every face in it.
    pub async fn encode_all(&self, image: Vec<u8>) -> Result<Vec<Embedding>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::EncodeAll {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Decode an uploaded image and embed its most confident face, if any.
    pub async fn encode_best(&self, image: Vec<u8>) -> Result<Option<Embedding>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::EncodeBest {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Version tag of the embedding model owned by the engine.
    pub fn model_version(&self) -> Option<&str> {
        self.model_version.as_deref()
    }
}

/// Spawn the engine on a dedicated OS thread that owns `encoder`.
///
/// Inference is synchronous and CPU-bound, so requests are queued and
/// served one at a time off the async runtime.
pub fn spawn_engine<E>(mut encoder: E) -> std::io::Result<EngineHandle>
where
    E: FaceEncoder + 'static,
{
    let model_version = encoder.model_version().map(str::to_owned);
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(8);

    std::thread::Builder::new()
        .name("vigia-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::EncodeAll { image, reply } => {
                        let _ = reply.send(run_encode_all(&mut encoder, &image));
                    }
                    EngineRequest::EncodeBest { image, reply } => {
                        let _ = reply.send(run_encode_best(&mut encoder, &image));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx, model_version })
}

fn run_encode_all<E: FaceEncoder>(encoder: &mut E, image: &[u8]) -> Result<Vec<Embedding>, EngineError> {
    let frame = Frame::decode(image)?;
    let encodings = encoder.encode_faces(&frame)?;
    tracing::debug!(
        width = frame.width,
        height = frame.height,
        faces = encodings.len(),
        "encode: faces embedded"
    );
    Ok(encodings.into_iter().map(|e| e.embedding).collect())
}

fn run_encode_best<E: FaceEncoder>(encoder: &mut E, image: &[u8]) -> Result<Option<Embedding>, EngineError> {
    let frame = Frame::decode(image)?;
    let best = encoder.encode_faces(&frame)?.into_iter().next();
    if let Some(encoding) = &best {
        tracing::debug!(confidence = encoding.face.confidence, "encode: best face selected");
    }
    Ok(best.map(|e| e.embedding))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic stand-in for the ONNX encoder.

    use std::io::Cursor;
    use vigia_core::{BoundingBox, EncoderError, Embedding, FaceEncoder, FaceEncoding, Frame};

    /// Produces one face per distinct colour in the top row of the image,
    /// embedding the colour as `[r, g, b] / 255`. A pure black image has no faces.
    pub struct ColorEncoder;

    impl FaceEncoder for ColorEncoder {
        fn encode_faces(&mut self, frame: &Frame) -> Result<Vec<FaceEncoding>, EncoderError> {
            let mut seen: Vec<[u8; 3]> = Vec::new();
            for px in frame.data.chunks_exact(3).take(frame.width as usize) {
                let rgb = [px[0], px[1], px[2]];
                if rgb != [0, 0, 0] && !seen.contains(&rgb) {
                    seen.push(rgb);
                }
            }
            Ok(seen
                .into_iter()
                .map(|rgb| FaceEncoding {
                    face: BoundingBox {
                        x: 0.0,
                        y: 0.0,
                        width: 1.0,
                        height: 1.0,
                        confidence: 0.9,
                        landmarks: None,
                    },
                    embedding: Embedding {
                        values: rgb.iter().map(|&c| c as f32 / 255.0).collect(),
                        model_version: Some("color-test".into()),
                    },
                })
                .collect())
        }

        fn model_version(&self) -> Option<&str> {
            Some("color-test")
        }
    }

    /// Lossless PNG whose top row holds the given colours as equal-width stripes.
    pub fn striped_image(colors: &[[u8; 3]]) -> Vec<u8> {
        let stripe = 16u32;
        let width = stripe * colors.len().max(1) as u32;
        let img = image::RgbImage::from_fn(width, 16, |x, _| {
            image::Rgb(colors.get((x / stripe) as usize).copied().unwrap_or([0, 0, 0]))
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{striped_image, ColorEncoder};
    use super::*;

    #[tokio::test]
    async fn test_encode_all_returns_every_face() {
        let engine = spawn_engine(ColorEncoder).unwrap();
        let embeddings = engine
            .encode_all(striped_image(&[[255, 0, 0], [0, 0, 255]]))
            .await
            .unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(engine.model_version(), Some("color-test"));
    }

    #[tokio::test]
    async fn test_encode_best_without_face() {
        let engine = spawn_engine(ColorEncoder).unwrap();
        let best = engine.encode_best(striped_image(&[[0, 0, 0]])).await.unwrap();
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_image() {
        let engine = spawn_engine(ColorEncoder).unwrap();
        let err = engine.encode_all(b"nope".to_vec()).await.unwrap_err();
        assert!(matches!(err, EngineError::Frame(_)));
    }
}
