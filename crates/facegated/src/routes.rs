use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

pub fn create_router(app_state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            "/detection",
            get(handlers::detection_form).post(handlers::detection_upload),
        )
        .route(
            "/recognition",
            get(handlers::recognition_form).post(handlers::recognition_upload),
        )
        .route("/compare", post(handlers::compare))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
