//! Explicit save across the configured backends.
//!
//! A save writes the local cache first, then tries each transport in
//! priority order. Remote failures never make the save fail: the report
//! always says the document is saved locally and lists what happened at
//! each backend. Only an invalid document turns the save into an error, and
//! in that case no backend is contacted.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::document::ContentDocument;
use crate::error::{FolioError, Result};
use crate::store::ContentStore;
use crate::transport::{SyncTransport, TransportKind, WriteReceipt};

const RETRY_PAUSE: Duration = Duration::from_millis(250);

/// What to do when a backend write fails.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next backend.
    #[default]
    Continue,
    /// Retry up to N more times while the backend is unavailable, then move on.
    Retry(u32),
    /// Record the failure and skip every remaining backend.
    Abort,
}

/// Save-wide settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavePolicy {
    /// Skip the remaining backends once a sufficient one (the local server)
    /// accepted the write.
    pub stop_after_sufficient: bool,
    /// Retries granted to non-sufficient backends that are unavailable.
    pub retry_unavailable: u32,
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self {
            stop_after_sufficient: true,
            retry_unavailable: 1,
        }
    }
}

/// What happened at one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The backend stored the document.
    Succeeded {
        /// Durability indicator from the backend.
        detail: String,
    },
    /// The backend could not be reached. Expected; not a warning.
    Unavailable {
        /// Why the connection failed.
        reason: String,
    },
    /// The backend answered with a failure status.
    Rejected {
        /// HTTP status, when there was one.
        status: u16,
        /// Backend-supplied message.
        detail: String,
    },
    /// The integrity token was missing or stale.
    Conflict {
        /// Backend-supplied message.
        detail: String,
    },
    /// The backend refused the document before sending, or failed locally.
    Invalid {
        /// What was wrong.
        reason: String,
    },
    /// Not attempted.
    Skipped,
}

impl WriteOutcome {
    fn from_result(result: Result<WriteReceipt>) -> Self {
        match result {
            Ok(receipt) => WriteOutcome::Succeeded {
                detail: receipt.detail,
            },
            Err(FolioError::TransportUnavailable { reason, .. }) => {
                WriteOutcome::Unavailable { reason }
            }
            Err(FolioError::TransportRejected { status, detail, .. }) => {
                WriteOutcome::Rejected { status, detail }
            }
            Err(FolioError::Conflict { detail, .. }) => WriteOutcome::Conflict { detail },
            Err(other) => WriteOutcome::Invalid {
                reason: other.to_string(),
            },
        }
    }

    /// Whether the write landed.
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Succeeded { .. })
    }

    /// Whether this outcome should be surfaced to the operator as a warning.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            WriteOutcome::Rejected { .. } | WriteOutcome::Conflict { .. } | WriteOutcome::Invalid { .. }
        )
    }
}

/// One line of a [`SaveReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendReport {
    /// Backend name.
    pub backend: String,
    /// Backend family.
    pub kind: TransportKind,
    /// Final outcome.
    #[serde(flatten)]
    pub outcome: WriteOutcome,
    /// Number of write attempts made (0 when skipped).
    pub attempts: u32,
}

/// The result of an explicit save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// Always true: the cache is written before any backend is tried.
    pub local_saved: bool,
    /// Per-backend outcomes in priority order.
    pub backends: Vec<BackendReport>,
}

impl SaveReport {
    /// Whether at least one remote backend stored the document.
    pub fn published(&self) -> bool {
        self.backends.iter().any(|b| b.outcome.is_success())
    }

    /// Human-readable warnings for rejected, conflicting or invalid writes.
    /// Unavailable backends are silent.
    pub fn warnings(&self) -> Vec<String> {
        self.backends
            .iter()
            .filter(|b| b.outcome.is_warning())
            .map(|b| match &b.outcome {
                WriteOutcome::Rejected { status, detail } => {
                    format!("{} rejected the save ({}): {}", b.backend, status, detail)
                }
                WriteOutcome::Conflict { detail } => format!(
                    "{} reported a conflict, save again to retry: {}",
                    b.backend, detail
                ),
                WriteOutcome::Invalid { reason } => format!("{}: {}", b.backend, reason),
                _ => String::new(),
            })
            .collect()
    }

    /// Outcome for the named backend.
    pub fn outcome(&self, backend: &str) -> Option<&WriteOutcome> {
        self.backends
            .iter()
            .find(|b| b.backend == backend)
            .map(|b| &b.outcome)
    }
}

struct Registered {
    transport: Arc<dyn SyncTransport>,
    failure_policy: FailurePolicy,
}

/// Writes the document to every configured backend in priority order.
pub struct SaveOrchestrator {
    transports: Vec<Registered>,
    policy: SavePolicy,
}

impl Default for SaveOrchestrator {
    fn default() -> Self {
        Self::new(SavePolicy::default())
    }
}

impl SaveOrchestrator {
    /// Create an orchestrator with no backends.
    pub fn new(policy: SavePolicy) -> Self {
        Self {
            transports: Vec::new(),
            policy,
        }
    }

    /// Append a backend at the lowest priority.
    ///
    /// Sufficient backends (the local server) get [`FailurePolicy::Continue`],
    /// since their absence is expected; the others get a bounded retry while
    /// unavailable.
    pub fn add_transport(&mut self, transport: Arc<dyn SyncTransport>) {
        let failure_policy = if transport.is_sufficient() || self.policy.retry_unavailable == 0 {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Retry(self.policy.retry_unavailable)
        };
        self.add_transport_with_policy(transport, failure_policy);
    }

    /// Append a backend with an explicit failure policy.
    pub fn add_transport_with_policy(
        &mut self,
        transport: Arc<dyn SyncTransport>,
        failure_policy: FailurePolicy,
    ) {
        self.transports.push(Registered {
            transport,
            failure_policy,
        });
    }

    /// Backend names in priority order.
    pub fn transport_names(&self) -> Vec<&str> {
        self.transports.iter().map(|r| r.transport.name()).collect()
    }

    /// Save the store's current document: cache first, then every backend.
    pub async fn save(&self, store: &ContentStore) -> Result<SaveReport> {
        let doc = store.get()?;
        store.cache().write(&doc);
        self.save_document(&doc).await
    }

    /// Try every backend with `doc`. The caller is responsible for the cache.
    pub async fn save_document(&self, doc: &ContentDocument) -> Result<SaveReport> {
        doc.validate()?;

        let mut backends = Vec::with_capacity(self.transports.len());
        let mut stop_reason: Option<String> = None;

        for registered in &self.transports {
            let transport = registered.transport.as_ref();
            if let Some(reason) = &stop_reason {
                log::debug!("save: skipping {} ({})", transport.name(), reason);
                backends.push(BackendReport {
                    backend: transport.name().to_string(),
                    kind: transport.kind(),
                    outcome: WriteOutcome::Skipped,
                    attempts: 0,
                });
                continue;
            }

            let (outcome, attempts) = self.attempt(transport, &registered.failure_policy, doc).await;
            log_outcome(transport.name(), &outcome);

            if outcome.is_success() {
                if transport.is_sufficient() && self.policy.stop_after_sufficient {
                    stop_reason = Some(format!("{} is sufficient", transport.name()));
                }
            } else if registered.failure_policy == FailurePolicy::Abort {
                stop_reason = Some(format!("{} failed", transport.name()));
            }

            backends.push(BackendReport {
                backend: transport.name().to_string(),
                kind: transport.kind(),
                outcome,
                attempts,
            });
        }

        Ok(SaveReport {
            local_saved: true,
            backends,
        })
    }

    async fn attempt(
        &self,
        transport: &dyn SyncTransport,
        failure_policy: &FailurePolicy,
        doc: &ContentDocument,
    ) -> (WriteOutcome, u32) {
        let max_attempts = match failure_policy {
            FailurePolicy::Retry(n) => n + 1,
            _ => 1,
        };
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = transport.try_write(doc).await;
            let retry = matches!(&result, Err(e) if e.is_unavailable()) && attempts < max_attempts;
            if !retry {
                return (WriteOutcome::from_result(result), attempts);
            }
            log::debug!(
                "save: {} unavailable, retrying ({}/{})",
                transport.name(),
                attempts,
                max_attempts - 1
            );
            tokio::time::sleep(RETRY_PAUSE).await;
        }
    }
}

fn log_outcome(backend: &str, outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Succeeded { detail } => log::info!("save: {} ok ({})", backend, detail),
        WriteOutcome::Unavailable { reason } => {
            log::debug!("save: {} unavailable: {}", backend, reason)
        }
        WriteOutcome::Rejected { status, detail } => {
            log::warn!("save: {} rejected ({}): {}", backend, status, detail)
        }
        WriteOutcome::Conflict { detail } => log::warn!("save: {} conflict: {}", backend, detail),
        WriteOutcome::Invalid { reason } => log::warn!("save: {} failed: {}", backend, reason),
        WriteOutcome::Skipped => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ChangeBroadcaster;
    use crate::cache::{LocalCache, MemoryCache};
    use crate::model::default_document;
    use crate::transport::{MemoryMode, MemoryTransport};
    use serde_json::json;

    fn store() -> (ContentStore, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let store = ContentStore::new(cache.clone(), ChangeBroadcaster::new());
        store.replace(default_document()).unwrap();
        cache.clear();
        (store, cache)
    }

    #[tokio::test]
    async fn test_invalid_document_reaches_no_backend() {
        let local = MemoryTransport::new("local").sufficient();
        let blob = MemoryTransport::new("blob");
        let mut orchestrator = SaveOrchestrator::default();
        orchestrator.add_transport(Arc::new(local.clone()));
        orchestrator.add_transport(Arc::new(blob.clone()));

        let doc = ContentDocument::from_value(json!({"personalInfo": {"name": "x"}})).unwrap();
        let err = orchestrator.save_document(&doc).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(local.write_count() + blob.write_count(), 0);
    }

    #[tokio::test]
    async fn test_sufficient_local_server_skips_the_rest() {
        let (store, cache) = store();
        let local = MemoryTransport::new("local").sufficient();
        let blob = MemoryTransport::new("blob");
        let mut orchestrator = SaveOrchestrator::default();
        orchestrator.add_transport(Arc::new(local.clone()));
        orchestrator.add_transport(Arc::new(blob.clone()));

        let report = orchestrator.save(&store).await.unwrap();
        assert!(report.local_saved);
        assert!(report.published());
        assert!(cache.read().is_some());
        assert_eq!(report.outcome("blob"), Some(&WriteOutcome::Skipped));
        assert_eq!(blob.write_count(), 0);
    }

    #[tokio::test]
    async fn test_all_backends_tried_when_not_stopping() {
        let (store, _) = store();
        let local = MemoryTransport::new("local").sufficient();
        let blob = MemoryTransport::new("blob");
        let mut orchestrator = SaveOrchestrator::new(SavePolicy {
            stop_after_sufficient: false,
            retry_unavailable: 0,
        });
        orchestrator.add_transport(Arc::new(local.clone()));
        orchestrator.add_transport(Arc::new(blob.clone()));

        orchestrator.save(&store).await.unwrap();
        assert_eq!(local.write_count(), 1);
        assert_eq!(blob.write_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_backends_still_save_locally() {
        let (store, cache) = store();
        let local = MemoryTransport::new("local").sufficient();
        local.set_mode(MemoryMode::Offline);
        let blob = MemoryTransport::new("blob");
        blob.set_mode(MemoryMode::Offline);
        let mut orchestrator = SaveOrchestrator::default();
        orchestrator.add_transport(Arc::new(local));
        orchestrator.add_transport(Arc::new(blob));

        let report = orchestrator.save(&store).await.unwrap();
        assert!(report.local_saved);
        assert!(!report.published());
        assert!(report.warnings().is_empty());
        assert_eq!(cache.read(), Some(default_document()));
        // The cloud backend got its single retry; the local server did not.
        assert_eq!(report.backends[0].attempts, 1);
        assert_eq!(report.backends[1].attempts, 2);
    }

    #[tokio::test]
    async fn test_fallthrough_to_cloud_after_transient_failure() {
        let (store, _) = store();
        let local = MemoryTransport::new("local").sufficient();
        local.set_mode(MemoryMode::Offline);
        let blob = MemoryTransport::new("blob");
        blob.fail_next(1);
        let mut orchestrator = SaveOrchestrator::default();
        orchestrator.add_transport(Arc::new(local));
        orchestrator.add_transport(Arc::new(blob.clone()));

        let report = orchestrator.save(&store).await.unwrap();
        assert!(report.published());
        assert_eq!(blob.write_count(), 1);
        assert!(matches!(
            report.outcome("blob"),
            Some(WriteOutcome::Succeeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejection_is_a_warning_and_abort_skips_rest() {
        let (store, _) = store();
        let kv = MemoryTransport::new("kv");
        kv.set_mode(MemoryMode::Rejecting);
        let blob = MemoryTransport::new("blob");
        let mut orchestrator = SaveOrchestrator::default();
        orchestrator.add_transport_with_policy(Arc::new(kv), FailurePolicy::Abort);
        orchestrator.add_transport(Arc::new(blob.clone()));

        let report = orchestrator.save(&store).await.unwrap();
        assert_eq!(report.warnings().len(), 1);
        assert!(report.warnings()[0].contains("kv rejected"));
        assert_eq!(report.outcome("blob"), Some(&WriteOutcome::Skipped));
        assert_eq!(orchestrator.transport_names(), vec!["kv", "blob"]);
    }

    #[tokio::test]
    async fn test_unpopulated_store_cannot_save() {
        let store = ContentStore::new(Arc::new(MemoryCache::new()), ChangeBroadcaster::new());
        let orchestrator = SaveOrchestrator::default();
        assert!(matches!(
            orchestrator.save(&store).await,
            Err(FolioError::DocumentMissing)
        ));
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = BackendReport {
            backend: "kv".into(),
            kind: TransportKind::KeyValue,
            outcome: WriteOutcome::Unavailable {
                reason: "offline".into(),
            },
            attempts: 2,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "unavailable");
        assert_eq!(json["reason"], "offline");
        assert_eq!(json["kind"], "key-value");
    }
}
