#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Configuration options
pub mod config;

/// Error (common error types)
pub mod error;

/// The content document, its sections and collections
pub mod document;

/// Typed section models, defaults and entry templates
pub mod model;

/// The in-memory content store
pub mod store;

/// Same-device durable storage
pub mod cache;

/// Same-tab and cross-tab change notification
pub mod broadcast;

/// Remote persistence backends
pub mod transport;

/// Explicit save across backends
pub mod save;

/// Resolving the document on startup
pub mod load;

/// Image upload and data-URL fallback
pub mod images;

pub use document::{CollectionPath, ContentDocument, Section};
pub use error::{FolioError, Result};
pub use store::ContentStore;
