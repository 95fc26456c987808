//! The document as a JSON file on the local file system.

use std::fs;
use std::path::{Path, PathBuf};

use super::{BoxFuture, SyncTransport, TransportKind, WriteReceipt};
use crate::cache::replace_file;
use crate::document::ContentDocument;
use crate::error::{FolioError, Result};

const NAME: &str = "json-file";

/// Reads and replaces a pretty-printed JSON file. A missing file reads as
/// absent.
#[derive(Debug, Clone)]
pub struct JsonFileTransport {
    path: PathBuf,
}

impl JsonFileTransport {
    /// Create a transport for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file synchronously.
    pub fn read_now(&self) -> Result<Option<ContentDocument>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FolioError::FileRead {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        ContentDocument::from_json_str(&text).map(Some)
    }

    /// Validate and write the file synchronously, replacing its contents.
    pub fn write_now(&self, doc: &ContentDocument) -> Result<()> {
        doc.validate()?;
        let json = doc.to_pretty_json()?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| FolioError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        replace_file(&self.path, &json).map_err(|source| FolioError::FileWrite {
            path: self.path.clone(),
            source,
        })
    }
}

impl SyncTransport for JsonFileTransport {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> TransportKind {
        TransportKind::JsonFile
    }

    fn try_read(&self) -> BoxFuture<'_, Result<Option<ContentDocument>>> {
        Box::pin(async move { self.read_now() })
    }

    fn try_write<'a>(&'a self, doc: &'a ContentDocument) -> BoxFuture<'a, Result<WriteReceipt>> {
        Box::pin(async move {
            self.write_now(doc)?;
            log::info!("{}: wrote {}", NAME, self.path.display());
            Ok(WriteReceipt::new(NAME, self.path.display().to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_document;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let transport = JsonFileTransport::new(dir.path().join("website-data.json"));
        assert_eq!(transport.try_read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_is_pretty_and_readable() {
        let dir = TempDir::new().unwrap();
        let transport = JsonFileTransport::new(dir.path().join("site/website-data.json"));
        let doc = default_document();

        transport.try_write(&doc).await.unwrap();
        let text = fs::read_to_string(transport.path()).unwrap();
        assert!(text.starts_with("{\n  \"personalInfo\""));
        assert_eq!(transport.try_read().await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_invalid_document_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let transport = JsonFileTransport::new(dir.path().join("website-data.json"));
        let doc = ContentDocument::from_value(json!({"about": {"text1": "x"}})).unwrap();
        assert!(transport.try_write(&doc).await.unwrap_err().is_validation());
        assert!(!transport.path().exists());
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let transport = JsonFileTransport::new(dir.path().join("website-data.json"));
        fs::write(transport.path(), "{\"stale\": true}").unwrap();

        let doc = default_document();
        transport.write_now(&doc).unwrap();
        assert_eq!(transport.read_now().unwrap(), Some(doc));
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("website-data.json")]);
    }

    #[test]
    fn test_failed_replace_cleans_up_temp_file() {
        let dir = TempDir::new().unwrap();
        // A directory in the way makes the final rename fail.
        let target = dir.path().join("website-data.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        let transport = JsonFileTransport::new(&target);
        let err = transport.write_now(&default_document()).unwrap_err();
        assert!(matches!(err, FolioError::FileWrite { .. }), "{:?}", err);
        assert!(target.join("keep").exists());
        assert!(!dir.path().join("website-data.json.tmp").exists());
    }
}
