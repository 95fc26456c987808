use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for folio operations
#[derive(Debug, Error)]
pub enum FolioError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Document errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid document: {0}")]
    Validation(String),

    #[error("No content document is loaded")]
    DocumentMissing,

    #[error("Unknown section '{0}'")]
    UnknownSection(String),

    #[error("Unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("No entry with id {id} in '{collection}'")]
    EntryNotFound { collection: String, id: u64 },

    #[error("Category '{0}' is reserved and cannot be removed")]
    ReservedCategory(String),

    // Transport errors
    #[error("{backend} is unavailable: {reason}")]
    TransportUnavailable { backend: String, reason: String },

    #[error("{backend} rejected the request ({status}): {detail}")]
    TransportRejected {
        backend: String,
        status: u16,
        detail: String,
    },

    #[error("{backend} reported a conflict: {detail}")]
    Conflict { backend: String, detail: String },

    #[error("Missing credential for {0}")]
    MissingCredential(String),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias for folio operations
pub type Result<T> = std::result::Result<T, FolioError>;

impl FolioError {
    /// Build a `TransportUnavailable` error for a backend.
    pub fn unavailable(backend: impl Into<String>, reason: impl ToString) -> Self {
        Self::TransportUnavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `TransportRejected` error for a backend.
    pub fn rejected(backend: impl Into<String>, status: u16, detail: impl Into<String>) -> Self {
        Self::TransportRejected {
            backend: backend.into(),
            status,
            detail: detail.into(),
        }
    }

    /// Whether this error means the backend could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::TransportUnavailable { .. })
    }

    /// Whether this error is a document validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether this error is an integrity-token conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Convert to a serializable representation for JSON responses
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}

/// A serializable representation of FolioError (e.g. for HTTP error bodies)
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
}

impl From<&FolioError> for SerializableError {
    fn from(err: &FolioError) -> Self {
        let kind = match err {
            FolioError::Io(_) => "Io",
            FolioError::FileRead { .. } => "FileRead",
            FolioError::FileWrite { .. } => "FileWrite",
            FolioError::Json(_) => "Json",
            FolioError::Validation(_) => "Validation",
            FolioError::DocumentMissing => "DocumentMissing",
            FolioError::UnknownSection(_) => "UnknownSection",
            FolioError::UnknownCollection(_) => "UnknownCollection",
            FolioError::EntryNotFound { .. } => "EntryNotFound",
            FolioError::ReservedCategory(_) => "ReservedCategory",
            FolioError::TransportUnavailable { .. } => "TransportUnavailable",
            FolioError::TransportRejected { .. } => "TransportRejected",
            FolioError::Conflict { .. } => "Conflict",
            FolioError::MissingCredential(_) => "MissingCredential",
            FolioError::ConfigParse(_) => "ConfigParse",
            FolioError::ConfigSerialize(_) => "ConfigSerialize",
            FolioError::NoConfigDir => "NoConfigDir",
        }
        .to_string();

        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<FolioError> for SerializableError {
    fn from(err: FolioError) -> Self {
        SerializableError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_predicates() {
        assert!(FolioError::unavailable("kv", "connection refused").is_unavailable());
        assert!(FolioError::Validation("missing about".into()).is_validation());
        let conflict = FolioError::Conflict {
            backend: "commit-api".into(),
            detail: "sha mismatch".into(),
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_unavailable());
    }

    #[test]
    fn test_serializable_kind() {
        let err = FolioError::rejected("object-store", 403, "forbidden");
        let ser = err.to_serializable();
        assert_eq!(ser.kind, "TransportRejected");
        assert!(ser.message.contains("403"));
    }
}
