//! Same-device durable storage for the content document.
//!
//! The cache holds exactly one document under a well-known id and is the
//! baseline of record: every mutation lands here before any network attempt.
//! Writes never fail observably; a storage failure is logged and the
//! in-memory document stays authoritative for the session.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::document::ContentDocument;

/// Replace `path` with `contents` by writing a sibling temp file and renaming
/// it over the target, so a reader never sees a half-written file.
pub(crate) fn replace_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

/// Durable single-slot storage for the content document.
pub trait LocalCache: Send + Sync {
    /// Overwrite the stored document.
    fn write(&self, doc: &ContentDocument);

    /// Read the stored document, if there is one.
    fn read(&self) -> Option<ContentDocument>;

    /// Remove the stored document.
    fn clear(&self);
}

/// A [`LocalCache`] backed by a pretty-printed JSON file at
/// `<dir>/<document_id>.json`.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    /// Create a cache for `document_id` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, document_id: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", document_id)),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalCache for FileCache {
    fn write(&self, doc: &ContentDocument) {
        let json = match doc.to_pretty_json() {
            Ok(json) => json,
            Err(e) => {
                log::warn!("cache: could not serialize document: {}", e);
                return;
            }
        };
        if let Some(parent) = self.path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            log::warn!("cache: could not create {}: {}", parent.display(), e);
            return;
        }
        match replace_file(&self.path, &json) {
            Ok(()) => log::debug!("cache: wrote {}", self.path.display()),
            Err(e) => log::warn!("cache: could not write {}: {}", self.path.display(), e),
        }
    }

    fn read(&self) -> Option<ContentDocument> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("cache: could not read {}: {}", self.path.display(), e);
                return None;
            }
        };
        match ContentDocument::from_json_str(&text) {
            Ok(doc) => Some(doc),
            Err(e) => {
                log::warn!("cache: ignoring unparsable {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn clear(&self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!("cache: could not remove {}: {}", self.path.display(), e);
        }
    }
}

/// An in-memory [`LocalCache`], for tests and for embedding without a disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: RwLock<Option<ContentDocument>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache already holding `doc`.
    pub fn with_document(doc: ContentDocument) -> Self {
        Self {
            slot: RwLock::new(Some(doc)),
        }
    }
}

impl LocalCache for MemoryCache {
    fn write(&self, doc: &ContentDocument) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(doc.clone());
    }

    fn read(&self) -> Option<ContentDocument> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn clear(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
