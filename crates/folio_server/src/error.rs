//! HTTP error responses.
//!
//! Every failure is answered with a JSON body `{"error": ..., "details"?: ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use folio_core::FolioError;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by the API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid data structure")]
    InvalidData,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("GitHub commit failed")]
    CommitFailed(FolioError),

    #[error(transparent)]
    Core(#[from] FolioError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Status code for a core error.
///
/// Bad input is the caller's fault; every other backend failure is a 500.
pub fn status_for(err: &FolioError) -> StatusCode {
    match err {
        FolioError::Validation(_) | FolioError::Json(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Status code for a failed commit, passing the upstream status through.
pub fn commit_status_for(err: &FolioError) -> StatusCode {
    match err {
        FolioError::Conflict { .. } => StatusCode::CONFLICT,
        FolioError::TransportRejected { status, .. } => StatusCode::from_u16(*status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        other => status_for(other),
    }
}

fn upstream_detail(err: &FolioError) -> String {
    match err {
        FolioError::TransportRejected { detail, .. } | FolioError::Conflict { detail, .. } => {
            detail.clone()
        }
        other => other.to_string(),
    }
}

impl ApiError {
    /// The response status
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidData | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::CommitFailed(err) => commit_status_for(err),
            ApiError::Core(err) => status_for(err),
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Core(FolioError::Validation(_)) => ErrorBody {
                error: ApiError::InvalidData.to_string(),
                details: None,
            },
            ApiError::CommitFailed(err) => ErrorBody {
                error: self.to_string(),
                details: Some(upstream_detail(err)),
            },
            ApiError::NotConfigured(_) => ErrorBody {
                error: self.to_string(),
                details: Some("Set the credentials in the server environment".to_string()),
            },
            other => ErrorBody {
                error: other.to_string(),
                details: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}: {}", status, self);
        } else {
            tracing::debug!("{}: {}", status, self);
        }
        (status, Json(self.body())).into_response()
    }
}
