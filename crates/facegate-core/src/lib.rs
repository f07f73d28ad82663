//! facegate-core — Face detection, encoding and comparison.
//!
//! Decodes uploaded images with the `image` crate, finds faces with SCRFD and
//! encodes them with ArcFace, both running via ONNX Runtime on the CPU.
//! Callers that only need the capability, not the models, program against
//! [`FaceAnalyzer`].

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod loader;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxFaceAnalyzer};
pub use detector::FaceDetector;
pub use loader::{allowed_file, load_image, LoadError, ALLOWED_EXTENSIONS};
pub use recognizer::FaceRecognizer;
pub use types::{
    distance_scale, face_distance, is_match, vector_distance, BoundingBox, DetectOptions,
    DetectedFace, DetectionModel, Embedding, FaceLocation, ARCFACE_MATCH_COSINE, DISTANCE_THRESHOLD,
};

/// File name of the SCRFD detection model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default model directory: `$XDG_DATA_HOME/facegate/models`, falling back
/// to `~/.local/share/facegate/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
        .join("models")
}
