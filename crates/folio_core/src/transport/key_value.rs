//! A cloud key-value entry (Redis REST style) holding the document under one
//! key.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use super::{
    BoxFuture, SyncTransport, TransportKind, WriteReceipt, check_status, http_client, join_url,
    send_error,
};
use crate::document::ContentDocument;
use crate::error::{FolioError, Result};

const NAME: &str = "key-value";

#[derive(Debug, Deserialize)]
struct CommandResponse {
    result: Option<serde_json::Value>,
}

/// `POST {url}/set/{key}` to write, `GET {url}/get/{key}` to read.
#[derive(Debug, Clone)]
pub struct KeyValueTransport {
    url: String,
    key: String,
    token: String,
    client: reqwest::Client,
}

impl KeyValueTransport {
    /// Create a transport for `key` on the REST endpoint at `url`.
    pub fn new(
        url: impl Into<String>,
        key: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(FolioError::MissingCredential(NAME.to_string()));
        }
        Ok(Self {
            url: url.into(),
            key: key.into(),
            token,
            client: http_client(timeout)?,
        })
    }

    async fn command(&self, request: reqwest::RequestBuilder) -> Result<CommandResponse> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| send_error(NAME, e))?;
        let response = check_status(NAME, response).await?;
        response
            .json()
            .await
            .map_err(|e| FolioError::rejected(NAME, 200, format!("unexpected response: {}", e)))
    }
}

impl SyncTransport for KeyValueTransport {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> TransportKind {
        TransportKind::KeyValue
    }

    fn try_read(&self) -> BoxFuture<'_, Result<Option<ContentDocument>>> {
        Box::pin(async move {
            let url = join_url(&self.url, &format!("get/{}", self.key));
            let reply = self.command(self.client.get(url)).await?;
            match reply.result {
                None | Some(serde_json::Value::Null) => Ok(None),
                // Stored as a JSON string; tolerate stores that return the
                // object already decoded.
                Some(serde_json::Value::String(text)) => {
                    ContentDocument::from_json_str(&text).map(Some)
                }
                Some(value) => ContentDocument::from_value(value).map(Some),
            }
        })
    }

    fn try_write<'a>(&'a self, doc: &'a ContentDocument) -> BoxFuture<'a, Result<WriteReceipt>> {
        Box::pin(async move {
            doc.validate()?;
            let url = join_url(&self.url, &format!("set/{}", self.key));
            let reply = self
                .command(self.client.post(url).body(doc.to_json()?))
                .await?;
            let result = reply
                .result
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            if result != "OK" {
                return Err(FolioError::rejected(
                    NAME,
                    200,
                    format!("unexpected SET result '{}'", result),
                ));
            }
            log::info!("{}: stored key {}", NAME, self.key);
            Ok(WriteReceipt::new(NAME, format!("key {}", self.key)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_document;
    use crate::transport::test_server;
    use axum::extract::{Path, State};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Entries = Arc<Mutex<HashMap<String, String>>>;

    async fn set(
        State(entries): State<Entries>,
        Path(key): Path<String>,
        body: String,
    ) -> Json<Value> {
        entries.lock().unwrap().insert(key, body);
        Json(json!({"result": "OK"}))
    }

    async fn get_entry(State(entries): State<Entries>, Path(key): Path<String>) -> Json<Value> {
        Json(json!({"result": entries.lock().unwrap().get(&key)}))
    }

    async fn spawn() -> (String, Entries) {
        let entries: Entries = Arc::new(Mutex::new(HashMap::new()));
        let router = Router::new()
            .route("/set/{key}", post(set))
            .route("/get/{key}", get(get_entry))
            .with_state(entries.clone());
        (test_server::spawn(router).await, entries)
    }

    #[tokio::test]
    async fn test_absent_key_reads_none() {
        let (url, _) = spawn().await;
        let kv = KeyValueTransport::new(url, "websiteData", "t", Duration::from_secs(5)).unwrap();
        assert_eq!(kv.try_read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_twice_reads_once() {
        let (url, entries) = spawn().await;
        let kv = KeyValueTransport::new(url, "websiteData", "t", Duration::from_secs(5)).unwrap();
        let doc = default_document();

        kv.try_write(&doc).await.unwrap();
        let after_first = kv.try_read().await.unwrap();
        kv.try_write(&doc).await.unwrap();
        let after_second = kv.try_read().await.unwrap();

        assert_eq!(after_first, Some(doc));
        assert_eq!(after_first, after_second);
        assert_eq!(entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_document_rejected_before_sending() {
        let (url, entries) = spawn().await;
        let kv = KeyValueTransport::new(url, "websiteData", "t", Duration::from_secs(5)).unwrap();
        let doc = ContentDocument::from_value(json!({"personalInfo": {"name": "x"}})).unwrap();

        assert!(kv.try_write(&doc).await.unwrap_err().is_validation());
        assert!(entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_is_unavailable() {
        let url = test_server::closed_url().await;
        let kv = KeyValueTransport::new(url, "websiteData", "t", Duration::from_secs(2)).unwrap();
        assert!(kv.try_read().await.unwrap_err().is_unavailable());
    }
}
