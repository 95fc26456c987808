//! A source-control contents API (GitHub style) with optimistic concurrency.
//!
//! Updating an existing file requires its current integrity token (the blob
//! `sha`). A write therefore reads the token first and sends it back with the
//! new content; a missing or stale token is answered with 409/422, reported
//! as [`FolioError::Conflict`]. No retry is attempted.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use super::{
    BoxFuture, SyncTransport, TransportKind, WriteReceipt, check_status, error_detail,
    http_client, join_url, send_error,
};
use crate::document::ContentDocument;
use crate::error::{FolioError, Result};

/// Public GitHub API root.
pub const DEFAULT_COMMIT_API_URL: &str = "https://api.github.com";

const NAME: &str = "commit-api";
const ACCEPT_V3: &str = "application/vnd.github.v3+json";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    sha: String,
}

/// Commits the document as a file in a repository. Write-only.
#[derive(Debug, Clone)]
pub struct CommitApiTransport {
    api_url: String,
    repo: String,
    branch: String,
    path: String,
    token: String,
    client: reqwest::Client,
}

impl CommitApiTransport {
    /// Create a transport committing `path` on `branch` of `repo`
    /// (`owner/name`).
    pub fn new(
        api_url: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        path: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let token = token.into();
        let repo = repo.into();
        if token.is_empty() {
            return Err(FolioError::MissingCredential(NAME.to_string()));
        }
        if repo.is_empty() {
            return Err(FolioError::MissingCredential(format!("{} repository", NAME)));
        }
        Ok(Self {
            api_url: api_url.into(),
            repo,
            branch: branch.into(),
            path: path.into(),
            token,
            client: http_client(timeout)?,
        })
    }

    fn contents_url(&self) -> String {
        join_url(
            &self.api_url,
            &format!("repos/{}/contents/{}", self.repo, self.path),
        )
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, ACCEPT_V3)
    }

    /// Read the stored file's current integrity token; `None` when the file
    /// does not exist yet.
    pub async fn fetch_integrity_token(&self) -> Result<Option<String>> {
        let response = self
            .request(reqwest::Method::GET, self.contents_url())
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| send_error(NAME, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(NAME, response).await?;
        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| FolioError::rejected(NAME, 200, format!("unexpected response: {}", e)))?;
        Ok(Some(contents.sha))
    }

    /// Create or update the file, sending `token` as the integrity token.
    ///
    /// Returns the commit id.
    pub async fn put_contents(
        &self,
        doc: &ContentDocument,
        token: Option<&str>,
    ) -> Result<WriteReceipt> {
        doc.validate()?;
        let request = PutContentsRequest {
            message: commit_message(chrono::Utc::now()),
            content: STANDARD.encode(doc.to_pretty_json()?),
            branch: &self.branch,
            sha: token,
        };
        let response = self
            .request(reqwest::Method::PUT, self.contents_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(NAME, e))?;

        let status = response.status();
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body);
            log::warn!("{}: integrity token rejected: {}", NAME, detail);
            return Err(FolioError::Conflict {
                backend: NAME.to_string(),
                detail,
            });
        }
        let response = check_status(NAME, response).await?;
        let body: PutContentsResponse = response
            .json()
            .await
            .map_err(|e| FolioError::rejected(NAME, 200, format!("unexpected response: {}", e)))?;
        log::info!(
            "{}: committed {} to {}@{} as {}",
            NAME,
            self.path,
            self.repo,
            self.branch,
            body.commit.sha
        );
        Ok(WriteReceipt::new(NAME, body.commit.sha))
    }
}

/// Commit message used for every content update.
pub fn commit_message(at: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "Update website content - {}",
        at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    )
}

impl SyncTransport for CommitApiTransport {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> TransportKind {
        TransportKind::CommitApi
    }

    fn supports_read(&self) -> bool {
        false
    }

    fn try_read(&self) -> BoxFuture<'_, Result<Option<ContentDocument>>> {
        Box::pin(async { Ok(None) })
    }

    fn try_write<'a>(&'a self, doc: &'a ContentDocument) -> BoxFuture<'a, Result<WriteReceipt>> {
        Box::pin(async move {
            doc.validate()?;
            let token = self.fetch_integrity_token().await?;
            log::debug!(
                "{}: {} integrity token for {}",
                NAME,
                if token.is_some() { "found" } else { "no" },
                self.path
            );
            self.put_contents(doc, token.as_deref()).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_document;
    use crate::transport::test_server;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Repo {
        sha: Option<String>,
        content: Option<String>,
        commits: u32,
        reads: u32,
    }

    type Shared = Arc<Mutex<Repo>>;

    async fn get_contents(State(repo): State<Shared>) -> (AxumStatus, Json<Value>) {
        let mut repo = repo.lock().unwrap();
        repo.reads += 1;
        match repo.sha.clone() {
            Some(sha) => (AxumStatus::OK, Json(json!({"sha": sha}))),
            None => (AxumStatus::NOT_FOUND, Json(json!({"message": "Not Found"}))),
        }
    }

    async fn put_contents(
        State(repo): State<Shared>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (AxumStatus, Json<Value>) {
        assert_eq!(headers.get("authorization").unwrap(), "token secret");
        assert_eq!(headers.get("accept").unwrap(), ACCEPT_V3);
        let mut repo = repo.lock().unwrap();
        let sent = body.get("sha").and_then(Value::as_str).map(String::from);
        match (&repo.sha, &sent) {
            (Some(_), None) => {
                return (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({"message": "\"sha\" wasn't supplied."})),
                );
            }
            (Some(current), Some(sent)) if current != sent => {
                return (
                    AxumStatus::CONFLICT,
                    Json(json!({"message": "website-data.json does not match"})),
                );
            }
            _ => {}
        }
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("Update website content - ")
        );
        assert_eq!(body["branch"], "main");
        repo.commits += 1;
        repo.sha = Some(format!("blob{}", repo.commits));
        repo.content = body["content"].as_str().map(String::from);
        (
            AxumStatus::CREATED,
            Json(json!({
                "content": {"sha": repo.sha},
                "commit": {"sha": format!("commit{}", repo.commits)}
            })),
        )
    }

    async fn spawn() -> (String, Shared) {
        let repo: Shared = Arc::new(Mutex::new(Repo::default()));
        let router = Router::new()
            .route(
                "/repos/owner/site/contents/website-data.json",
                get(get_contents).put(put_contents),
            )
            .with_state(repo.clone());
        (test_server::spawn(router).await, repo)
    }

    fn transport(url: &str) -> CommitApiTransport {
        CommitApiTransport::new(
            url,
            "owner/site",
            "main",
            "website-data.json",
            "secret",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_update_without_token_conflicts() {
        let (url, repo) = spawn().await;
        let transport = transport(&url);
        let doc = default_document();

        assert_eq!(transport.fetch_integrity_token().await.unwrap(), None);
        let first = transport.put_contents(&doc, None).await.unwrap();
        assert_eq!(first.detail, "commit1");

        let err = transport.put_contents(&doc, None).await.unwrap_err();
        assert!(err.is_conflict(), "{:?}", err);
        assert_eq!(repo.lock().unwrap().commits, 1);
    }

    #[tokio::test]
    async fn test_stale_token_conflicts() {
        let (url, _) = spawn().await;
        let transport = transport(&url);
        let doc = default_document();

        transport.put_contents(&doc, None).await.unwrap();
        let stale = transport.fetch_integrity_token().await.unwrap();
        transport.put_contents(&doc, stale.as_deref()).await.unwrap();

        let err = transport.put_contents(&doc, stale.as_deref()).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_try_write_reads_token_first() {
        let (url, repo) = spawn().await;
        let transport = transport(&url);
        let doc = default_document();

        transport.try_write(&doc).await.unwrap();
        let receipt = transport.try_write(&doc).await.unwrap();
        assert_eq!(receipt.detail, "commit2");

        let content = repo.lock().unwrap().content.clone().unwrap();
        let decoded = String::from_utf8(STANDARD.decode(content).unwrap()).unwrap();
        assert_eq!(ContentDocument::from_json_str(&decoded).unwrap(), doc);
    }

    #[tokio::test]
    async fn test_invalid_document_rejected_before_token_read() {
        let (url, repo) = spawn().await;
        let doc = ContentDocument::from_value(json!({"about": {"text1": "x"}})).unwrap();

        let err = transport(&url).try_write(&doc).await.unwrap_err();
        assert!(err.is_validation(), "{:?}", err);
        let repo = repo.lock().unwrap();
        assert_eq!(repo.commits, 0);
        assert_eq!(repo.reads, 0);
    }

    #[tokio::test]
    async fn test_write_only() {
        let (url, _) = spawn().await;
        let transport = transport(&url);
        assert!(!transport.supports_read());
        assert_eq!(transport.try_read().await.unwrap(), None);
    }

    #[test]
    fn test_commit_message_format() {
        let at = chrono::DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(
            commit_message(at),
            "Update website content - 2026-03-01T12:00:00.000Z"
        );
    }
}
