//! The operator's local companion server (see the `folio-server` binary).

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{
    BoxFuture, SyncTransport, TransportKind, WriteReceipt, check_status, http_client, join_url,
    read_document, send_error,
};
use crate::document::ContentDocument;
use crate::error::{FolioError, Result};

/// Default address of the companion server.
pub const DEFAULT_LOCAL_SERVER_URL: &str = "http://localhost:3001";

const NAME: &str = "local-server";

#[derive(Debug, Deserialize)]
struct SaveResponse {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    path: String,
}

/// Writes through `POST /api/save`; reads the served data file.
///
/// Connection failures are expected (the server only runs when the operator
/// starts it) and surface as `TransportUnavailable`.
#[derive(Debug, Clone)]
pub struct LocalServerTransport {
    base_url: String,
    document_path: String,
    client: reqwest::Client,
}

impl LocalServerTransport {
    /// Create a transport for the server at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            document_path: "website-data.json".to_string(),
            client: http_client(timeout)?,
        })
    }

    /// Read the document from a different served path.
    pub fn with_document_path(mut self, path: impl Into<String>) -> Self {
        self.document_path = path.into();
        self
    }

    /// Base URL of the server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload an image through `POST /api/upload-image` and return the
    /// site-relative path the server stored it under.
    pub async fn upload_image(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<String> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|e| FolioError::Validation(format!("bad mime type '{}': {}", mime, e)))?;
        let form = Form::new()
            .part("image", part)
            .text("filename", filename.to_string());

        let response = self
            .client
            .post(join_url(&self.base_url, "/api/upload-image"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| send_error(NAME, e))?;
        let response = check_status(NAME, response).await?;
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| FolioError::rejected(NAME, 200, format!("unexpected response: {}", e)))?;
        log::info!("{}: uploaded image to {}", NAME, body.path);
        Ok(body.path)
    }
}

impl SyncTransport for LocalServerTransport {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> TransportKind {
        TransportKind::LocalServer
    }

    fn is_sufficient(&self) -> bool {
        true
    }

    fn try_read(&self) -> BoxFuture<'_, Result<Option<ContentDocument>>> {
        Box::pin(async move {
            let response = self
                .client
                .get(join_url(&self.base_url, &self.document_path))
                .send()
                .await
                .map_err(|e| send_error(NAME, e))?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let response = check_status(NAME, response).await?;
            read_document(NAME, response).await.map(Some)
        })
    }

    fn try_write<'a>(&'a self, doc: &'a ContentDocument) -> BoxFuture<'a, Result<WriteReceipt>> {
        Box::pin(async move {
            doc.validate()?;
            let response = self
                .client
                .post(join_url(&self.base_url, "/api/save"))
                .json(doc)
                .send()
                .await
                .map_err(|e| send_error(NAME, e))?;
            let response = check_status(NAME, response).await?;
            let body: SaveResponse = response.json().await.unwrap_or(SaveResponse {
                timestamp: None,
                message: None,
            });
            let detail = body
                .timestamp
                .map(|ts| format!("saved at {}", ts))
                .or(body.message)
                .unwrap_or_else(|| "saved".to_string());
            log::info!("{}: {}", NAME, detail);
            Ok(WriteReceipt::new(NAME, detail))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_document;
    use crate::transport::test_server;
    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    type Saved = Arc<Mutex<Option<Value>>>;

    async fn save(State(saved): State<Saved>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body.get("personalInfo").is_none() || body.get("about").is_none() {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid data structure"})),
            );
        }
        *saved.lock().unwrap() = Some(body);
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Data saved successfully",
                "timestamp": "2026-01-01T00:00:00Z"
            })),
        )
    }

    async fn data(State(saved): State<Saved>) -> std::result::Result<Json<Value>, StatusCode> {
        saved.lock().unwrap().clone().map(Json).ok_or(StatusCode::NOT_FOUND)
    }

    async fn spawn() -> (String, Saved) {
        let saved: Saved = Arc::new(Mutex::new(None));
        let router = Router::new()
            .route("/api/save", post(save))
            .route("/website-data.json", get(data))
            .with_state(saved.clone());
        (test_server::spawn(router).await, saved)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (url, saved) = spawn().await;
        let transport = LocalServerTransport::new(&url, Duration::from_secs(5)).unwrap();

        assert_eq!(transport.try_read().await.unwrap(), None);

        let doc = default_document();
        let receipt = transport.try_write(&doc).await.unwrap();
        assert_eq!(receipt.detail, "saved at 2026-01-01T00:00:00Z");
        assert!(saved.lock().unwrap().is_some());
        assert_eq!(transport.try_read().await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_invalid_document_never_sent() {
        let (url, saved) = spawn().await;
        let transport = LocalServerTransport::new(&url, Duration::from_secs(5)).unwrap();
        let doc = ContentDocument::from_value(json!({"about": {"text1": "x"}})).unwrap();

        let err = transport.try_write(&doc).await.unwrap_err();
        assert!(err.is_validation());
        assert!(saved.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let url = test_server::closed_url().await;
        let transport = LocalServerTransport::new(&url, Duration::from_secs(2)).unwrap();
        let err = transport.try_write(&default_document()).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(transport.try_read().await.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn test_upload_image_returns_path() {
        async fn upload() -> Json<Value> {
            Json(json!({"success": true, "path": "./assets/images/client-4-logo.png"}))
        }
        let router = Router::new().route("/api/upload-image", post(upload));
        let url = test_server::spawn(router).await;
        let transport = LocalServerTransport::new(&url, Duration::from_secs(5)).unwrap();

        let path = transport
            .upload_image("client-4-logo.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(path, "./assets/images/client-4-logo.png");
    }
}
