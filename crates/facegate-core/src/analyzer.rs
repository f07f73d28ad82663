//! The face-recognition capability as seen by callers.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, DetectOptions, DetectedFace, Embedding, FaceLocation};
use crate::{ARCFACE_MODEL_FILE, SCRFD_MODEL_FILE};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Strategy for finding and encoding faces in a decoded image.
///
/// Implementations may hold inference sessions that need exclusive access,
/// hence `&mut self`.
pub trait FaceAnalyzer: Send {
    /// Find every face and encode it in one pass. Element `i` carries the
    /// location and encoding of the same face.
    fn detect_faces(
        &mut self,
        image: &RgbImage,
        options: DetectOptions,
    ) -> Result<Vec<DetectedFace>, AnalyzerError>;

    /// Locate faces without encoding them.
    fn face_locations(
        &mut self,
        image: &RgbImage,
        options: DetectOptions,
    ) -> Result<Vec<FaceLocation>, AnalyzerError>;

    /// Encode every face found with the default detection options.
    fn face_encodings(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, AnalyzerError> {
        Ok(self
            .detect_faces(image, DetectOptions::default())?
            .into_iter()
            .map(|face| face.encoding)
            .collect())
    }
}

/// SCRFD + ArcFace running on ONNX Runtime.
pub struct OnnxFaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceAnalyzer {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path, intra_threads: usize) -> Result<Self, AnalyzerError> {
        let scrfd = model_dir.join(SCRFD_MODEL_FILE);
        let arcface = model_dir.join(ARCFACE_MODEL_FILE);

        let detector = FaceDetector::load(&scrfd.to_string_lossy(), intra_threads)?;
        let recognizer = FaceRecognizer::load(&arcface.to_string_lossy(), intra_threads)?;

        Ok(Self { detector, recognizer })
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn detect_faces(
        &mut self,
        image: &RgbImage,
        options: DetectOptions,
    ) -> Result<Vec<DetectedFace>, AnalyzerError> {
        let (width, height) = image.dimensions();
        let boxes = self.detector.detect(image, options)?;

        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in &boxes {
            let encoding = self.recognizer.extract(image, bbox)?;
            faces.push(DetectedFace {
                location: FaceLocation::from_bbox(bbox, width, height),
                encoding,
                confidence: bbox.confidence,
            });
        }
        Ok(faces)
    }

    fn face_locations(
        &mut self,
        image: &RgbImage,
        options: DetectOptions,
    ) -> Result<Vec<FaceLocation>, AnalyzerError> {
        let boxes = self.detector.detect(image, options)?;
        Ok(locations_of(&boxes, image))
    }
}

/// Detector boxes as clamped locations, in detector order.
fn locations_of(boxes: &[BoundingBox], image: &RgbImage) -> Vec<FaceLocation> {
    let (width, height) = image.dimensions();
    boxes
        .iter()
        .map(|bbox| FaceLocation::from_bbox(bbox, width, height))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Finds one fixed face per red unit in the top-left pixel.
    struct RedCountAnalyzer;

    impl FaceAnalyzer for RedCountAnalyzer {
        fn detect_faces(
            &mut self,
            image: &RgbImage,
            _options: DetectOptions,
        ) -> Result<Vec<DetectedFace>, AnalyzerError> {
            let count = image.get_pixel(0, 0)[0] as usize;
            Ok((0..count)
                .map(|i| DetectedFace {
                    location: FaceLocation::from([0, 10, 10, 0]),
                    encoding: Embedding::from_values(vec![i as f32]),
                    confidence: 1.0,
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

    #[test]
    fn test_default_face_encodings_follows_detect_faces() {
        let image = RgbImage::from_pixel(4, 4, Rgb([3, 0, 0]));
        let encodings = RedCountAnalyzer.face_encodings(&image).unwrap();
        let values: Vec<f32> = encodings.iter().map(|e| e.values[0]).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_locations_of_keeps_order_and_clamps() {
        let image = RgbImage::new(100, 50);
        let boxes = [
            BoundingBox { x: 10.0, y: 5.0, width: 20.0, height: 30.0, confidence: 0.9, landmarks: None },
            BoundingBox { x: 90.0, y: -3.0, width: 40.0, height: 20.0, confidence: 0.7, landmarks: None },
        ];
        assert_eq!(
            locations_of(&boxes, &image),
            vec![FaceLocation::from([5, 30, 35, 10]), FaceLocation::from([0, 100, 17, 90])]
        );
    }

    #[test]
    fn test_load_missing_models() {
        let dir = std::env::temp_dir().join("facegate-no-models-here");
        let err = OnnxFaceAnalyzer::load(&dir, 1).err().expect("load must fail");
        assert!(matches!(err, AnalyzerError::Detector(DetectorError::ModelNotFound(_))));
    }

    #[test]
    fn test_recognizer_error_is_wrapped() {
        let err: AnalyzerError = RecognizerError::NoLandmarks.into();
        assert!(matches!(err, AnalyzerError::Recognizer(RecognizerError::NoLandmarks)));
        assert!(err.to_string().contains("no landmarks"));
    }
}
