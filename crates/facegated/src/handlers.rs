use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, OriginalUri, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use facegate_core::{is_match, vector_distance, DetectOptions, DetectionModel, DISTANCE_THRESHOLD};

use crate::dtos::{CompareRequest, DetectionResponse, RetCode, RetResponse};
use crate::error::ApiError;
use crate::upload::read_uploads;
use crate::AppState;

const DETECTION_FORM: &str = r#"<!doctype html>
<title>detect the picture features</title>
<h1>Upload a picture and output the features</h1>
<form method="POST" enctype="multipart/form-data">
  <input type="file" name="file">
  <input type="submit" value="Upload">
</form>
"#;

const RECOGNITION_FORM: &str = r#"<!doctype html>
<title>compare two pictures</title>
<h1>Upload two pictures and see if they show the same person</h1>
<form method="POST" enctype="multipart/form-data">
  <input type="file" name="knownfile">
  <input type="file" name="detectfile">
  <input type="submit" value="Upload">
</form>
"#;

/// Options for `/detection`: no upsampling, fast profile.
const DETECTION_OPTIONS: DetectOptions = DetectOptions {
    upsample: 0,
    model: DetectionModel::Hog,
};

/// Send the client back to the form it posted from.
fn back_to_form(uri: &OriginalUri) -> Response {
    let target = uri
        .0
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.0.path());
    Redirect::to(target).into_response()
}

pub async fn detection_form() -> Html<&'static str> {
    Html(DETECTION_FORM)
}

pub async fn recognition_form() -> Html<&'static str> {
    Html(RECOGNITION_FORM)
}

pub async fn detection_upload(
    State(state): State<Arc<AppState>>,
    uri: OriginalUri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let Ok(multipart) = multipart else {
        return Ok(back_to_form(&uri));
    };
    let mut form = read_uploads(multipart).await;
    let Some(file) = form.take_valid("file") else {
        return Ok(back_to_form(&uri));
    };

    tracing::info!(filename = %file.filename, size = file.bytes.len(), "detection requested");
    let faces = state.engine.detect(file.bytes, DETECTION_OPTIONS).await?;

    Ok(Json(DetectionResponse::from(faces)).into_response())
}

pub async fn recognition_upload(
    State(state): State<Arc<AppState>>,
    uri: OriginalUri,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let Ok(multipart) = multipart else {
        return Ok(back_to_form(&uri));
    };
    let mut form = read_uploads(multipart).await;
    let (Some(known), Some(detect)) = (form.take_valid("knownfile"), form.take_valid("detectfile")) else {
        return Ok(back_to_form(&uri));
    };

    tracing::info!(
        known = %known.filename,
        detect = %detect.filename,
        "recognition requested"
    );
    let recognition = state.engine.recognize(known.bytes, detect.bytes).await?;

    Ok(Json(RetResponse::from(recognition)).into_response())
}

/// Distance between two precomputed encodings. No detection runs here.
pub async fn compare(body: Bytes) -> Json<RetResponse> {
    let Some(req) = CompareRequest::parse(&body) else {
        tracing::debug!(size = body.len(), "compare: format error");
        return Json(RetResponse::failure(RetCode::FormatError));
    };

    let distance = vector_distance(&req.knownface, &req.detectface);
    if !distance.is_finite() {
        // JSON has no representation for a non-finite distance.
        tracing::debug!("compare: distance overflowed");
        return Json(RetResponse::failure(RetCode::FormatError));
    }
    tracing::debug!(distance, matched = is_match(distance), "compare: done");

    Json(RetResponse::distances(vec![vec![distance]]))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": if state.engine.is_running() { "ok" } else { "degraded" },
        "service": "facegated",
        "version": env!("CARGO_PKG_VERSION"),
        "models_loaded": state.engine.is_running(),
        "distance_threshold": DISTANCE_THRESHOLD,
    }))
}
