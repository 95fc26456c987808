//! Image references for collection entries.
//!
//! An image is uploaded to the local companion server when it is running;
//! otherwise it is embedded in the document as a `data:` URL so the edit is
//! still kept locally.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::document::CollectionPath;
use crate::error::{FolioError, Result};
use crate::store::ContentStore;
use crate::transport::LocalServerTransport;

/// Where an attached image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePlacement {
    /// Stored by the companion server at this site-relative path.
    Uploaded(String),
    /// Embedded as a data URL of this many bytes.
    Embedded(usize),
}

/// Reduce a file name to `[A-Za-z0-9._-]`, dropping any directory part.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

/// File name used when uploading an image for an entry, e.g.
/// `client-4-logo.png` or `portfolio-2-poster.jpg`.
pub fn upload_filename(path: CollectionPath, id: u64, original: &str) -> String {
    let prefix = match path {
        CollectionPath::Clients => "client",
        CollectionPath::PortfolioItems => "portfolio",
        CollectionPath::Services => "service",
        CollectionPath::Experience => "experience",
        CollectionPath::Education => "education",
        CollectionPath::Skills => "skill",
    };
    format!("{}-{}-{}", prefix, id, sanitize_filename(original))
}

/// Guess an image MIME type from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

/// Encode bytes as a `data:<mime>;base64,...` URL.
pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Attach the image at `file` to entry `id` of `path`, uploading through
/// `server` when possible and embedding it otherwise.
pub async fn attach_image(
    store: &ContentStore,
    server: Option<&LocalServerTransport>,
    path: CollectionPath,
    id: u64,
    file: &Path,
) -> Result<ImagePlacement> {
    if store.get()?.find_entry(path, id).is_none() {
        return Err(FolioError::EntryNotFound {
            collection: path.label().to_string(),
            id,
        });
    }
    let bytes = std::fs::read(file).map_err(|source| FolioError::FileRead {
        path: file.to_path_buf(),
        source,
    })?;
    let mime = mime_for_path(file);
    let original = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image");
    let filename = upload_filename(path, id, original);

    let uploaded = match server {
        Some(server) => match server.upload_image(&filename, bytes.clone(), mime).await {
            Ok(stored) => Some(stored),
            Err(e) if e.is_unavailable() => {
                log::info!("images: server not available, embedding {}", filename);
                None
            }
            Err(e) => {
                log::warn!("images: upload failed, embedding {}: {}", filename, e);
                None
            }
        },
        None => None,
    };

    let (reference, placement) = match uploaded {
        Some(stored) => (stored.clone(), ImagePlacement::Uploaded(stored)),
        None => (to_data_url(&bytes, mime), ImagePlacement::Embedded(bytes.len())),
    };
    store.update_entry_field(path, id, "image", Value::String(reference))?;
    Ok(placement)
}
