//! An in-process transport with scriptable failures, for tests and demos.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use super::{BoxFuture, SyncTransport, TransportKind, WriteReceipt};
use crate::document::ContentDocument;
use crate::error::{FolioError, Result};

/// How a [`MemoryTransport`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    /// Store and serve documents.
    Online,
    /// Fail every call with `TransportUnavailable`.
    Offline,
    /// Fail every write with `TransportRejected` (status 500).
    Rejecting,
}

/// Holds the document in memory. Clones share the same slot.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    name: String,
    sufficient: bool,
    slot: Arc<RwLock<Option<ContentDocument>>>,
    mode: Arc<RwLock<MemoryMode>>,
    writes: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
}

impl MemoryTransport {
    /// Create an empty, online transport.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sufficient: false,
            slot: Arc::new(RwLock::new(None)),
            mode: Arc::new(RwLock::new(MemoryMode::Online)),
            writes: Arc::new(AtomicUsize::new(0)),
            failures_left: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mark a successful write here as sufficient.
    pub fn sufficient(mut self) -> Self {
        self.sufficient = true;
        self
    }

    /// Pre-populate the stored document.
    pub fn with_document(self, doc: ContentDocument) -> Self {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(doc);
        self
    }

    /// Change how calls are answered.
    pub fn set_mode(&self, mode: MemoryMode) {
        *self.mode.write().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    /// Be unavailable for the next `n` calls, then come back online.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// The stored document.
    pub fn stored(&self) -> Option<ContentDocument> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of accepted writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<MemoryMode> {
        let transient = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let mode = *self.mode.read().unwrap_or_else(|e| e.into_inner());
        if transient || mode == MemoryMode::Offline {
            return Err(FolioError::unavailable(&self.name, "offline"));
        }
        Ok(mode)
    }
}

impl SyncTransport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Memory
    }

    fn is_sufficient(&self) -> bool {
        self.sufficient
    }

    fn try_read(&self) -> BoxFuture<'_, Result<Option<ContentDocument>>> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.stored())
        })
    }

    fn try_write<'a>(&'a self, doc: &'a ContentDocument) -> BoxFuture<'a, Result<WriteReceipt>> {
        Box::pin(async move {
            doc.validate()?;
            if self.check_reachable()? == MemoryMode::Rejecting {
                return Err(FolioError::rejected(&self.name, 500, "rejected"));
            }
            *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(doc.clone());
            let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(WriteReceipt::new(&self.name, format!("write {}", n)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_document;

    #[tokio::test]
    async fn test_fail_next_then_recover() {
        let transport = MemoryTransport::new("mem");
        transport.fail_next(1);
        let doc = default_document();
        assert!(transport.try_write(&doc).await.unwrap_err().is_unavailable());
        transport.try_write(&doc).await.unwrap();
        assert_eq!(transport.write_count(), 1);
        assert_eq!(transport.try_read().await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_rejecting_mode() {
        let transport = MemoryTransport::new("mem");
        transport.set_mode(MemoryMode::Rejecting);
        let err = transport.try_write(&default_document()).await.unwrap_err();
        assert!(matches!(err, FolioError::TransportRejected { status: 500, .. }));
        assert!(transport.stored().is_none());
    }
}
