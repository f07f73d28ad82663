use facegate_core::{DetectedFace, FaceLocation};
use serde::{Deserialize, Serialize};

use crate::engine::Recognition;

/// `/detection` success body. Index `i` of both lists is the same face.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub encodings: Vec<Vec<f32>>,
    pub locations: Vec<FaceLocation>,
}

impl From<Vec<DetectedFace>> for DetectionResponse {
    fn from(faces: Vec<DetectedFace>) -> Self {
        let (encodings, locations) = faces
            .into_iter()
            .map(|face| (face.encoding.values, face.location))
            .unzip();
        Self { encodings, locations }
    }
}

/// `/compare` request body: two precomputed encodings.
#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub knownface: Vec<f64>,
    pub detectface: Vec<f64>,
}

impl CompareRequest {
    /// Parse and shape-check a raw body. Any problem is a format error.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        // Serde would also accept a two-element array for a struct.
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        if !value.is_object() {
            return None;
        }
        let req: Self = serde_json::from_value(value).ok()?;
        let shaped = !req.knownface.is_empty() && req.knownface.len() == req.detectface.len();
        shaped.then_some(req)
    }
}

/// Application-level result codes carried in a 200 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RetCode {
    Ok = 0,
    AmbiguousKnownFace = 1,
    NoFace = 2,
    FormatError = 3,
}

impl RetCode {
    fn message(self) -> Option<&'static str> {
        match self {
            RetCode::Ok => None,
            RetCode::AmbiguousKnownFace => Some("knownface has more than one face"),
            RetCode::NoFace => Some("knownface or detectface has no face"),
            RetCode::FormatError => Some("format error"),
        }
    }
}

/// `/recognition` and `/compare` body: `{"ret":0,"results":[..]}` or
/// `{"ret":n,"msg":".."}`.
#[derive(Debug, Serialize)]
pub struct RetResponse {
    pub ret: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Vec<f64>>>,
}

impl RetResponse {
    pub fn failure(code: RetCode) -> Self {
        Self { ret: code as u8, msg: code.message(), results: None }
    }

    pub fn distances(results: Vec<Vec<f64>>) -> Self {
        Self { ret: RetCode::Ok as u8, msg: None, results: Some(results) }
    }
}

impl From<Recognition> for RetResponse {
    fn from(recognition: Recognition) -> Self {
        match recognition {
            Recognition::AmbiguousKnownFace => Self::failure(RetCode::AmbiguousKnownFace),
            Recognition::NoFace => Self::failure(RetCode::NoFace),
            Recognition::Distances(results) => Self::distances(results),
        }
    }
}
