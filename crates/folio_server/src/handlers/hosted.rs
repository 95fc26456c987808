//! Endpoints for the hosted deployment, backed by cloud stores.

use axum::{body::Bytes, extract::State, response::Json};
use folio_core::ContentDocument;
use folio_core::transport::SyncTransport;
use serde::Serialize;
use tracing::{info, warn};

use super::local::now_rfc3339;
use super::parse_document;
use crate::error::ApiError;
use crate::state::AppState;

/// Response for a document published to the blob store
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub message: String,
    pub url: String,
    pub timestamp: String,
}

/// Response for a document committed to the repository
#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub success: bool,
    pub message: String,
    pub commit: String,
    pub timestamp: String,
}

/// GET /api/get-website - Read the document from the key-value entry
///
/// Answers 404 whenever the entry cannot be served so the site falls back to
/// its static data file.
pub async fn get_website(State(state): State<AppState>) -> Result<Json<ContentDocument>, ApiError> {
    let Some(kv) = &state.key_value else {
        return Err(ApiError::NotFound("No data in KV, using file".to_string()));
    };
    match kv.try_read().await {
        Ok(Some(doc)) => Ok(Json(doc)),
        Ok(None) => Err(ApiError::NotFound("No data in KV, using file".to_string())),
        Err(e) => {
            warn!("Error retrieving from KV: {}", e);
            Err(ApiError::NotFound("Using file fallback".to_string()))
        }
    }
}

/// POST /api/update-website - Publish the document to the blob store
pub async fn update_website(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PublishResponse>, ApiError> {
    let doc = parse_document(&body)?;
    let store = state
        .object_store
        .as_ref()
        .ok_or(ApiError::NotConfigured("Blob storage"))?;
    let receipt = store.try_write(&doc).await?;

    info!("Saved to blob storage: {}", receipt.detail);
    Ok(Json(PublishResponse {
        success: true,
        message: "Data saved successfully".to_string(),
        url: receipt.detail,
        timestamp: now_rfc3339(),
    }))
}

/// POST /api/update-website-github - Commit the document to the repository
pub async fn update_website_github(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CommitResponse>, ApiError> {
    let doc = parse_document(&body)?;
    doc.validate()?;
    let commit_api = state
        .commit_api
        .as_ref()
        .ok_or(ApiError::NotConfigured("GitHub token"))?;
    let receipt = commit_api.try_write(&doc).await.map_err(|e| {
        if e.is_unavailable() {
            ApiError::Core(e)
        } else {
            ApiError::CommitFailed(e)
        }
    })?;

    info!("Committed website content as {}", receipt.detail);
    Ok(Json(CommitResponse {
        success: true,
        message: "Data saved and committed. The site will redeploy.".to_string(),
        commit: receipt.detail,
        timestamp: now_rfc3339(),
    }))
}
