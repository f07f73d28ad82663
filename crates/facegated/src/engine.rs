use facegate_core::{
    face_distance, is_match, load_image, AnalyzerError, DetectOptions, DetectedFace, Embedding,
    FaceAnalyzer, LoadError,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("image error: {0}")]
    Image(#[from] LoadError),
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Outcome of matching the faces of one image against a reference image.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    /// The reference image shows more than one face.
    AmbiguousKnownFace,
    /// One of the images shows no face.
    NoFace,
    /// For each face in the probe image, its distance to each reference face.
    Distances(Vec<Vec<f64>>),
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Detect {
        image: Vec<u8>,
        options: DetectOptions,
        reply: oneshot::Sender<Result<Vec<DetectedFace>, EngineError>>,
    },
    Recognize {
        known: Vec<u8>,
        probe: Vec<u8>,
        reply: oneshot::Sender<Result<Recognition, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// False once the engine thread has exited.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Decode an image and return every face with its location and encoding.
    pub async fn detect(
        &self,
        image: Vec<u8>,
        options: DetectOptions,
    ) -> Result<Vec<DetectedFace>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Detect {
                image,
                options,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Decode both images, encode their faces and measure probe faces
    /// against the known face.
    pub async fn recognize(&self, known: Vec<u8>, probe: Vec<u8>) -> Result<Recognition, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Recognize {
                known,
                probe,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread that owns `analyzer`.
///
/// The thread runs until every handle is dropped.
pub fn spawn_engine<A>(analyzer: A, queue: usize) -> std::io::Result<EngineHandle>
where
    A: FaceAnalyzer + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            let mut analyzer = analyzer;
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Detect { image, options, reply } => {
                        let result = run_detect(&mut analyzer, &image, options);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Recognize { known, probe, reply } => {
                        let result = run_recognize(&mut analyzer, &known, &probe);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn run_detect<A: FaceAnalyzer>(
    analyzer: &mut A,
    bytes: &[u8],
    options: DetectOptions,
) -> Result<Vec<DetectedFace>, EngineError> {
    let image = load_image(bytes)?;
    let faces = analyzer.detect_faces(&image, options)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        faces = faces.len(),
        "detect: done"
    );
    Ok(faces)
}

fn run_recognize<A: FaceAnalyzer>(
    analyzer: &mut A,
    known_bytes: &[u8],
    probe_bytes: &[u8],
) -> Result<Recognition, EngineError> {
    let known_image = load_image(known_bytes)?;
    let probe_image = load_image(probe_bytes)?;

    let known = analyzer.face_encodings(&known_image)?;
    let probe = analyzer.face_encodings(&probe_image)?;
    tracing::debug!(known = known.len(), probe = probe.len(), "recognize: encoded");

    Ok(match_encodings(&known, &probe))
}

/// Apply the reference-face policy and measure every probe face against
/// the known faces.
pub fn match_encodings(known: &[Embedding], probe: &[Embedding]) -> Recognition {
    if known.len() > 1 {
        return Recognition::AmbiguousKnownFace;
    }
    if known.is_empty() || probe.is_empty() {
        return Recognition::NoFace;
    }

    let distances: Vec<Vec<f64>> = probe.iter().map(|face| face_distance(known, face)).collect();
    let matches = distances.iter().flatten().filter(|&&d| is_match(d)).count();
    tracing::debug!(faces = distances.len(), matches, "recognize: compared");

    Recognition::Distances(distances)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic analyzer for exercising the engine and the HTTP layer
    //! without model files.

    use super::*;
    use facegate_core::FaceLocation;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Reads faces off the top-left pixel: red = face count, green and blue
    /// = the first two encoding components (scaled by 1/100). Face `i` is
    /// shifted by `i` in the first component.
    pub struct PixelAnalyzer;

    impl FaceAnalyzer for PixelAnalyzer {
        fn detect_faces(
            &mut self,
            image: &RgbImage,
            _options: DetectOptions,
        ) -> Result<Vec<DetectedFace>, AnalyzerError> {
            let Rgb([count, g, b]) = *image.get_pixel(0, 0);
            Ok((0..count)
                .map(|i| {
                    let left = i as i32 * 20;
                    DetectedFace {
                        location: FaceLocation { top: 0, right: left + 10, bottom: 10, left },
                        encoding: Embedding::from_values(vec![g as f32 / 100.0 + i as f32, b as f32 / 100.0]),
                        confidence: 1.0,
                    }
                })
                .collect())
        }

        fn face_locations(
            &mut self,
            image: &RgbImage,
            options: DetectOptions,
        ) -> Result<Vec<FaceLocation>, AnalyzerError> {
            Ok(self.detect_faces(image, options)?.into_iter().map(|f| f.location).collect())
        }
    }

    /// PNG bytes of a small image whose top-left pixel is `pixel`.
    pub fn png(pixel: [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_pixel(4, 4, Rgb(pixel));
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageFormat::Png)
            .expect("in-memory PNG encoding");
        buf.into_inner()
    }
}
