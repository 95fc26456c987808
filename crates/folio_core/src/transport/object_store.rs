//! A cloud blob store holding the document as a single named object.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use super::{
    BoxFuture, SyncTransport, TransportKind, WriteReceipt, check_status, http_client, join_url,
    read_document, send_error,
};
use crate::document::ContentDocument;
use crate::error::{FolioError, Result};

const NAME: &str = "object-store";

#[derive(Debug, Deserialize)]
struct PutResponse {
    url: String,
}

/// `PUT {api_url}/{pathname}` with overwrite semantics; reads come from the
/// object's public address when one is configured.
#[derive(Debug, Clone)]
pub struct ObjectStoreTransport {
    api_url: String,
    pathname: String,
    token: String,
    public_url: Option<String>,
    client: reqwest::Client,
}

impl ObjectStoreTransport {
    /// Create a transport writing `pathname` through the blob API at `api_url`.
    pub fn new(
        api_url: impl Into<String>,
        pathname: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(FolioError::MissingCredential(NAME.to_string()));
        }
        Ok(Self {
            api_url: api_url.into(),
            pathname: pathname.into(),
            token,
            public_url: None,
            client: http_client(timeout)?,
        })
    }

    /// A read-only transport over the object's public address. Writes fail
    /// with a missing-credential error.
    pub fn public_reader(public_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_url: String::new(),
            pathname: String::new(),
            token: String::new(),
            public_url: Some(public_url.into()),
            client: http_client(timeout)?,
        })
    }

    /// Enable reads from the object's public address.
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }
}

impl SyncTransport for ObjectStoreTransport {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> TransportKind {
        TransportKind::ObjectStore
    }

    fn supports_read(&self) -> bool {
        self.public_url.is_some()
    }

    fn try_read(&self) -> BoxFuture<'_, Result<Option<ContentDocument>>> {
        Box::pin(async move {
            let Some(url) = self.public_url.as_deref() else {
                return Ok(None);
            };
            let response = self
                .client
                .get(url)
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
            if self.token.is_empty() {
                return Err(FolioError::MissingCredential(NAME.to_string()));
            }
            let body = doc.to_pretty_json()?;
            let response = self
                .client
                .put(join_url(&self.api_url, &self.pathname))
                .header(AUTHORIZATION, format!("Bearer {}", self.token))
                .header(CONTENT_TYPE, "application/json")
                .header("x-content-type", "application/json")
                .header("x-add-random-suffix", "0")
                .body(body)
                .send()
                .await
                .map_err(|e| send_error(NAME, e))?;
            let response = check_status(NAME, response).await?;
            let stored: PutResponse = response.json().await.map_err(|e| {
                FolioError::rejected(NAME, 200, format!("unexpected response: {}", e))
            })?;
            log::info!("{}: stored {} at {}", NAME, self.pathname, stored.url);
            Ok(WriteReceipt::new(NAME, stored.url))
        })
    }
}
