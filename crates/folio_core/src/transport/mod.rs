//! Remote persistence backends.
//!
//! Every backend implements [`SyncTransport`]: an optional read path and a
//! whole-document write path. A backend that cannot be reached reports
//! [`FolioError::TransportUnavailable`], one that answers with a failure
//! status reports [`FolioError::TransportRejected`], and the commit API
//! reports [`FolioError::Conflict`] on an integrity-token mismatch.

mod commit_api;
mod json_file;
mod key_value;
mod local_server;
mod memory;
mod object_store;

pub use commit_api::{CommitApiTransport, DEFAULT_COMMIT_API_URL, commit_message};
pub use json_file::JsonFileTransport;
pub use key_value::KeyValueTransport;
pub use local_server::{DEFAULT_LOCAL_SERVER_URL, LocalServerTransport};
pub use memory::{MemoryMode, MemoryTransport};
pub use object_store::ObjectStoreTransport;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use crate::document::ContentDocument;
use crate::error::{FolioError, Result};

/// A boxed future that is Send (for use with multi-threaded runtimes).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Timeout applied to every remote call unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("folio/", env!("CARGO_PKG_VERSION"));

/// The family a backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// The operator's local companion server.
    LocalServer,
    /// A cloud blob store holding the document as one named object.
    ObjectStore,
    /// A cloud key-value entry holding the document under one key.
    KeyValue,
    /// A source-control contents API with optimistic concurrency.
    CommitApi,
    /// A JSON file on the local file system.
    JsonFile,
    /// An in-process store, for tests.
    Memory,
}

impl TransportKind {
    /// Stable identifier used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::LocalServer => "local-server",
            TransportKind::ObjectStore => "object-store",
            TransportKind::KeyValue => "key-value",
            TransportKind::CommitApi => "commit-api",
            TransportKind::JsonFile => "json-file",
            TransportKind::Memory => "memory",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof of a successful remote write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    /// Name of the backend that accepted the write.
    pub backend: String,
    /// Durability indicator: a storage address, commit id or timestamp.
    pub detail: String,
}

impl WriteReceipt {
    /// Create a receipt.
    pub fn new(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            detail: detail.into(),
        }
    }
}

/// A remote persistence backend for the content document.
///
/// Implementations must validate the document (see
/// [`validate_document`](crate::document::validate_document)) before sending
/// anything, so an invalid document never reaches a backend.
pub trait SyncTransport: Send + Sync {
    /// Human-readable name for this backend instance.
    fn name(&self) -> &str;

    /// The backend family.
    fn kind(&self) -> TransportKind;

    /// Whether [`try_read`](Self::try_read) can return a document.
    fn supports_read(&self) -> bool {
        true
    }

    /// Whether a successful write here makes the remaining backends optional.
    fn is_sufficient(&self) -> bool {
        false
    }

    /// Fetch the stored document. `Ok(None)` means the backend is reachable
    /// but holds nothing.
    fn try_read(&self) -> BoxFuture<'_, Result<Option<ContentDocument>>>;

    /// Store `doc`, overwriting whatever the backend held.
    fn try_write<'a>(&'a self, doc: &'a ContentDocument) -> BoxFuture<'a, Result<WriteReceipt>>;
}

/// Build the HTTP client shared by one transport's calls.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FolioError::unavailable("http", e))
}

/// Map a request that never produced a response (refused, timed out, DNS).
pub(crate) fn send_error(backend: &str, err: reqwest::Error) -> FolioError {
    if err.is_timeout() {
        FolioError::unavailable(backend, "request timed out")
    } else {
        FolioError::unavailable(backend, err)
    }
}

/// Pass a successful response through; turn a failure status into
/// `TransportRejected`, preferring the body's `error` field as detail.
pub(crate) async fn check_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FolioError::rejected(backend, status.as_u16(), error_detail(&body)))
}

/// Extract a readable message from an error body.
pub(crate) fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .or_else(|| json.get("message"))
                .and_then(|v| v.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Join a base URL and a path with exactly one slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Decode a response body as a content document.
pub(crate) async fn read_document(
    backend: &str,
    response: reqwest::Response,
) -> Result<ContentDocument> {
    let text = response
        .text()
        .await
        .map_err(|e| FolioError::unavailable(backend, e))?;
    ContentDocument::from_json_str(&text)
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Throw-away HTTP servers for transport tests.

    use axum::Router;
    use tokio::net::TcpListener;

    /// Serve `router` on an ephemeral port and return its base URL.
    pub async fn spawn(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// A base URL nothing listens on.
    pub async fn closed_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://a/", "/b"), "http://a/b");
        assert_eq!(join_url("http://a", "b/c"), "http://a/b/c");
    }

    #[test]
    fn test_error_detail_prefers_error_field() {
        assert_eq!(error_detail(r#"{"error":"Invalid data structure"}"#), "Invalid data structure");
        assert_eq!(error_detail(r#"{"message":"Bad credentials"}"#), "Bad credentials");
        assert_eq!(error_detail(" plain text \n"), "plain text");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(TransportKind::CommitApi.to_string(), "commit-api");
        assert_eq!(
            serde_json::to_value(TransportKind::KeyValue).unwrap(),
            serde_json::json!("key-value")
        );
    }
}
