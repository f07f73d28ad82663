use serde::{Deserialize, Serialize};

/// Reported distance at or below which two encodings are the same person.
pub const DISTANCE_THRESHOLD: f64 = 0.6;

/// Cosine similarity at which two unit-length ArcFace encodings are judged
/// the same person. Reported distances are scaled so this lands on
/// [`DISTANCE_THRESHOLD`].
pub const ARCFACE_MATCH_COSINE: f64 = 0.35;

/// SCRFD input side for the fast profile.
const HOG_INPUT_SIZE: usize = 640;
/// SCRFD input side for the accurate profile.
const CNN_INPUT_SIZE: usize = 960;
/// Each upsample step doubles the input side; beyond two steps the tensor
/// no longer fits comfortably in memory on CPU.
const MAX_UPSAMPLE: u32 = 2;

/// Raw detector output in image coordinates, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Pixel-space face box, serialized as `[top, right, bottom, left]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct FaceLocation {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceLocation {
    /// Convert a detector box to a location clamped to the image bounds.
    pub fn from_bbox(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        Self {
            top: bbox.y.max(0.0).round() as i32,
            right: (bbox.x + bbox.width).min(w).round() as i32,
            bottom: (bbox.y + bbox.height).min(h).round() as i32,
            left: bbox.x.max(0.0).round() as i32,
        }
    }
}

impl From<[i32; 4]> for FaceLocation {
    fn from([top, right, bottom, left]: [i32; 4]) -> Self {
        Self { top, right, bottom, left }
    }
}

impl From<FaceLocation> for [i32; 4] {
    fn from(loc: FaceLocation) -> Self {
        [loc.top, loc.right, loc.bottom, loc.left]
    }
}

/// Face encoding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn from_values(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Raw Euclidean distance, accumulated in f64.
    pub fn euclidean_distance(&self, other: &Embedding) -> f64 {
        euclidean(
            self.values.iter().map(|&v| f64::from(v)),
            other.values.iter().map(|&v| f64::from(v)),
        )
    }
}

fn euclidean(a: impl Iterator<Item = f64>, b: impl Iterator<Item = f64>) -> f64 {
    a.zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

/// Factor from raw Euclidean distance between unit encodings to reported
/// distance. Unit vectors at cosine `c` are `sqrt(2 - 2c)` apart.
pub fn distance_scale() -> f64 {
    DISTANCE_THRESHOLD / (2.0 - 2.0 * ARCFACE_MATCH_COSINE).sqrt()
}

/// A face found by a joint detection + encoding pass. Location and encoding
/// always describe the same face.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub location: FaceLocation,
    pub encoding: Embedding,
    pub confidence: f32,
}

/// Detector profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionModel {
    /// Fast profile.
    #[default]
    Hog,
    /// Accurate profile: larger input, slower, finds smaller faces.
    Cnn,
}

/// Options for a detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectOptions {
    /// How many times to double the detector input side (capped at 2).
    pub upsample: u32,
    pub model: DetectionModel,
}

impl DetectOptions {
    /// Square detector input side in pixels.
    pub fn input_size(&self) -> usize {
        let base = match self.model {
            DetectionModel::Hog => HOG_INPUT_SIZE,
            DetectionModel::Cnn => CNN_INPUT_SIZE,
        };
        base << self.upsample.min(MAX_UPSAMPLE)
    }
}

/// Reported distance from `query` to every encoding in `known`, in order.
pub fn face_distance(known: &[Embedding], query: &Embedding) -> Vec<f64> {
    let scale = distance_scale();
    known.iter().map(|k| k.euclidean_distance(query) * scale).collect()
}

/// Reported distance between two encodings given as plain f64 vectors.
/// May be infinite when the squared components overflow.
pub fn vector_distance(known: &[f64], query: &[f64]) -> f64 {
    euclidean(known.iter().copied(), query.iter().copied()) * distance_scale()
}

/// Same-person judgment for a distance.
pub fn is_match(distance: f64) -> bool {
    distance <= DISTANCE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Embedding::from_values(vec![0.1, -0.2, 0.3]);
        assert!(a.euclidean_distance(&a).abs() < 1e-12);
    }

    #[test]
    fn test_euclidean_distance_known_value() {
        let a = Embedding::from_values(vec![0.0, 0.0]);
        let b = Embedding::from_values(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_face_distance_preserves_order() {
        let known = vec![
            Embedding::from_values(vec![1.0, 0.0]),
            Embedding::from_values(vec![0.0, 0.0]),
        ];
        let query = Embedding::from_values(vec![0.0, 0.0]);
        let d = face_distance(&known, &query);
        assert_eq!(d.len(), 2);
        assert!((d[0] - distance_scale()).abs() < 1e-9);
        assert!(d[1].abs() < 1e-9);
    }

    #[test]
    fn test_face_distance_empty_known() {
        let query = Embedding::from_values(vec![1.0]);
        assert!(face_distance(&[], &query).is_empty());
    }

    fn unit_pair(cosine: f64) -> (Embedding, Embedding) {
        let sine = (1.0 - cosine * cosine).sqrt();
        (
            Embedding::from_values(vec![1.0, 0.0]),
            Embedding::from_values(vec![cosine as f32, sine as f32]),
        )
    }

    #[test]
    fn test_calibrated_cosine_maps_onto_threshold() {
        let (a, b) = unit_pair(ARCFACE_MATCH_COSINE);
        let d = face_distance(&[a], &b)[0];
        assert!((d - DISTANCE_THRESHOLD).abs() < 1e-6, "distance {d}");
    }

    #[test]
    fn test_typical_same_person_cosine_is_a_match() {
        // Genuine ArcFace pairs usually land between cosine 0.4 and 0.7.
        for cosine in [0.4, 0.6, 0.7] {
            let (a, b) = unit_pair(cosine);
            assert!(is_match(face_distance(&[a], &b)[0]), "cosine {cosine}");
        }
        for cosine in [0.0, 0.2, -0.5] {
            let (a, b) = unit_pair(cosine);
            assert!(!is_match(face_distance(&[a], &b)[0]), "cosine {cosine}");
        }
    }

    #[test]
    fn test_vector_distance_keeps_f64_range_and_precision() {
        let far = vector_distance(&[1e39], &[0.0]);
        assert!(far.is_finite());
        assert!((far / distance_scale() - 1e39).abs() / 1e39 < 1e-12);

        let near = vector_distance(&[0.1], &[0.1000000001]);
        assert!(near > 0.0 && near < 1e-9);

        assert!(vector_distance(&[1e200], &[0.0]).is_infinite());
    }

    #[test]
    fn test_is_match_threshold_inclusive() {
        assert!(is_match(0.0));
        assert!(is_match(DISTANCE_THRESHOLD));
        assert!(!is_match(0.61));
    }

    #[test]
    fn test_face_location_serializes_as_array() {
        let loc = FaceLocation { top: 10, right: 80, bottom: 90, left: 5 };
        assert_eq!(serde_json::to_string(&loc).unwrap(), "[10,80,90,5]");
        let back: FaceLocation = serde_json::from_str("[10,80,90,5]").unwrap();
        assert_eq!(back, loc);
    }

    #[test]
    fn test_face_location_clamped_to_image() {
        let bbox = BoundingBox {
            x: -4.0, y: -2.6, width: 120.0, height: 50.0,
            confidence: 0.9, landmarks: None,
        };
        let loc = FaceLocation::from_bbox(&bbox, 100, 40);
        assert_eq!(loc, FaceLocation { top: 0, right: 100, bottom: 40, left: 0 });
    }

    #[test]
    fn test_input_size_profiles() {
        assert_eq!(DetectOptions::default().input_size(), 640);
        let cnn = DetectOptions { upsample: 0, model: DetectionModel::Cnn };
        assert_eq!(cnn.input_size(), 960);
        let up = DetectOptions { upsample: 1, model: DetectionModel::Hog };
        assert_eq!(up.input_size(), 1280);
        let capped = DetectOptions { upsample: 7, model: DetectionModel::Hog };
        assert_eq!(capped.input_size(), 2560);
    }

    #[test]
    fn test_detection_model_serde_lowercase() {
        assert_eq!(serde_json::to_string(&DetectionModel::Cnn).unwrap(), "\"cnn\"");
        let m: DetectionModel = serde_json::from_str("\"hog\"").unwrap();
        assert_eq!(m, DetectionModel::Hog);
    }
}
