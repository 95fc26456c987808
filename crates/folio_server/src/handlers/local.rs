//! Endpoints used while editing on the operator's machine.

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
};
use chrono::{SecondsFormat, Utc};
use folio_core::images::sanitize_filename;
use folio_core::{ContentDocument, FolioError};
use serde::Serialize;
use tracing::info;

use super::parse_document;
use crate::error::ApiError;
use crate::state::AppState;

/// Response for a successful save
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

/// Response for a stored image
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub path: String,
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// POST /api/save - Overwrite the data file with the posted document
pub async fn save_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SaveResponse>, ApiError> {
    let doc: ContentDocument = parse_document(&body)?;
    let data_file = state.data_file.clone();
    let target = data_file.path().to_path_buf();
    tokio::task::spawn_blocking(move || data_file.write_now(&doc))
        .await
        .map_err(|e| FolioError::FileWrite {
            path: target.clone(),
            source: std::io::Error::other(e),
        })??;

    info!("Updated {}", target.display());
    Ok(Json(SaveResponse {
        success: true,
        message: "Data saved successfully".to_string(),
        timestamp: now_rfc3339(),
    }))
}

/// POST /api/upload-image - Store an image under the site's image directory
///
/// Expects a multipart body with an `image` file part and an optional
/// `filename` text part naming the stored file.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut image: Option<(Option<String>, Bytes)> = None;
    let mut requested: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let original = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                image = Some((original, bytes));
            }
            Some("filename") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                requested = Some(text);
            }
            _ => {}
        }
    }

    let Some((original, bytes)) = image else {
        return Err(ApiError::BadRequest("No image provided".to_string()));
    };
    let filename = sanitize_filename(
        requested
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(original.as_deref())
            .unwrap_or("image"),
    );

    let dir = state.config.images_path();
    let target = dir.join(&filename);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| FolioError::FileWrite {
            path: dir.clone(),
            source,
        })?;
    tokio::fs::write(&target, &bytes)
        .await
        .map_err(|source| FolioError::FileWrite {
            path: target.clone(),
            source,
        })?;

    info!("Stored image {} ({} bytes)", target.display(), bytes.len());
    Ok(Json(UploadResponse {
        success: true,
        path: state.config.image_reference(&filename),
    }))
}
