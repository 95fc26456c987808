//! Resolving the authoritative document when a session starts.
//!
//! The local cache always wins: unsynced local edits must never be clobbered
//! by an older remote copy. Only when the cache is empty are the read
//! sources tried, in order; the first document found is adopted and mirrored
//! into the cache. If nothing yields a document the store stays unpopulated
//! and consumers fall back to their own defaults.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::store::ContentStore;
use crate::transport::SyncTransport;

/// Where the adopted document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// The local cache.
    Cache,
    /// A read source, by name.
    Backend(String),
    /// Nothing had a document.
    Nothing,
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadSource::Cache => f.write_str("local cache"),
            LoadSource::Backend(name) => f.write_str(name),
            LoadSource::Nothing => f.write_str("nothing"),
        }
    }
}

/// The result of [`LoadOrchestrator::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Where the document came from.
    pub source: LoadSource,
    /// Read sources that failed along the way, as `name: error`.
    pub failures: Vec<String>,
}

impl LoadOutcome {
    /// Whether a document was adopted.
    pub fn is_loaded(&self) -> bool {
        self.source != LoadSource::Nothing
    }
}

/// Resolves the document from the cache or the configured read sources.
#[derive(Default)]
pub struct LoadOrchestrator {
    sources: Vec<Arc<dyn SyncTransport>>,
}

impl LoadOrchestrator {
    /// Create an orchestrator with no read sources (cache only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a read source at the lowest priority. Write-only transports are
    /// ignored.
    pub fn add_source(&mut self, source: Arc<dyn SyncTransport>) {
        if source.supports_read() {
            self.sources.push(source);
        } else {
            log::debug!("load: {} has no read path, not used as a source", source.name());
        }
    }

    /// Read source names in priority order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Populate `store` with the authoritative document.
    pub async fn resolve(&self, store: &ContentStore) -> Result<LoadOutcome> {
        if store.cache().read().is_some() {
            store.reload_from_cache()?;
            log::debug!("load: using the local cache");
            return Ok(LoadOutcome {
                source: LoadSource::Cache,
                failures: Vec::new(),
            });
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match source.try_read().await {
                Ok(Some(doc)) => {
                    log::info!("load: adopted document from {}", source.name());
                    store.replace(doc)?;
                    return Ok(LoadOutcome {
                        source: LoadSource::Backend(source.name().to_string()),
                        failures,
                    });
                }
                Ok(None) => log::debug!("load: {} has no document", source.name()),
                Err(e) if e.is_unavailable() => {
                    log::debug!("load: {} unavailable: {}", source.name(), e);
                    failures.push(format!("{}: {}", source.name(), e));
                }
                Err(e) => {
                    log::warn!("load: {} failed: {}", source.name(), e);
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        log::info!("load: no document found; the store stays empty");
        Ok(LoadOutcome {
            source: LoadSource::Nothing,
            failures,
        })
    }
}

impl fmt::Debug for LoadOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOrchestrator")
            .field("sources", &self.source_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ChangeBroadcaster;
    use crate::cache::{LocalCache, MemoryCache};
    use crate::document::{ContentDocument, Section};
    use crate::model::default_document;
    use crate::transport::{MemoryMode, MemoryTransport};
    use serde_json::json;

    fn remote_doc() -> ContentDocument {
        let mut doc = default_document();
        doc.set_section(Section::About, json!({"text1": "remote", "text2": ""}));
        doc
    }

    #[tokio::test]
    async fn test_cache_wins_over_remote() {
        let local_doc = default_document();
        let cache = Arc::new(MemoryCache::with_document(local_doc.clone()));
        let store = ContentStore::new(cache, ChangeBroadcaster::new());
        let remote = MemoryTransport::new("kv").with_document(remote_doc());

        let mut loader = LoadOrchestrator::new();
        loader.add_source(Arc::new(remote));
        let outcome = loader.resolve(&store).await.unwrap();

        assert_eq!(outcome.source, LoadSource::Cache);
        assert_eq!(store.get().unwrap(), local_doc);
    }

    #[tokio::test]
    async fn test_first_remote_hit_is_mirrored() {
        let cache = Arc::new(MemoryCache::new());
        let store = ContentStore::new(cache.clone(), ChangeBroadcaster::new());
        let offline = MemoryTransport::new("kv");
        offline.set_mode(MemoryMode::Offline);
        let empty = MemoryTransport::new("local-server");
        let file = MemoryTransport::new("json-file").with_document(remote_doc());

        let mut loader = LoadOrchestrator::new();
        loader.add_source(Arc::new(offline));
        loader.add_source(Arc::new(empty));
        loader.add_source(Arc::new(file));
        let outcome = loader.resolve(&store).await.unwrap();

        assert_eq!(outcome.source, LoadSource::Backend("json-file".into()));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(store.get().unwrap(), remote_doc());
        assert_eq!(cache.read(), Some(remote_doc()));
    }

    #[tokio::test]
    async fn test_nothing_leaves_store_empty() {
        let store = ContentStore::new(Arc::new(MemoryCache::new()), ChangeBroadcaster::new());
        let outcome = LoadOrchestrator::new().resolve(&store).await.unwrap();
        assert!(!outcome.is_loaded());
        assert!(!store.is_populated());
    }
}
