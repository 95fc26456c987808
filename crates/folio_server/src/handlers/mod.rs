pub mod hosted;
pub mod local;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use folio_core::ContentDocument;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// Largest accepted request body (documents may embed images as data URLs)
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Create API routes
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/save", post(local::save_data).fallback(method_not_allowed))
        .route(
            "/upload-image",
            post(local::upload_image).fallback(method_not_allowed),
        )
        .route(
            "/get-website",
            get(hosted::get_website).fallback(method_not_allowed),
        )
        .route(
            "/update-website",
            post(hosted::update_website).fallback(method_not_allowed),
        )
        .route(
            "/update-website-github",
            post(hosted::update_website_github).fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Parse a posted document; anything but a JSON object is rejected.
pub(crate) fn parse_document(body: &[u8]) -> Result<ContentDocument, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;
    ContentDocument::from_value(value).map_err(|_| ApiError::InvalidData)
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
