use std::sync::Arc;

use folio_core::Result;
use folio_core::transport::{
    CommitApiTransport, JsonFileTransport, KeyValueTransport, ObjectStoreTransport,
};

use crate::config::Config;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The data file served to the site and overwritten by `/api/save`
    pub data_file: Arc<JsonFileTransport>,
    pub object_store: Option<Arc<ObjectStoreTransport>>,
    pub key_value: Option<Arc<KeyValueTransport>>,
    pub commit_api: Option<Arc<CommitApiTransport>>,
}

impl AppState {
    /// Build the state and the hosted backends the configuration enables.
    pub fn new(config: Config) -> Result<Self> {
        let timeout = config.timeout();

        let object_store = match &config.blob {
            Some(blob) => {
                let mut transport = ObjectStoreTransport::new(
                    &blob.api_url,
                    &blob.pathname,
                    &blob.token,
                    timeout,
                )?;
                if let Some(url) = &blob.public_url {
                    transport = transport.with_public_url(url);
                }
                Some(Arc::new(transport))
            }
            None => None,
        };

        let key_value = match &config.kv {
            Some(kv) => Some(Arc::new(KeyValueTransport::new(
                &kv.url, &kv.key, &kv.token, timeout,
            )?)),
            None => None,
        };

        let commit_api = match &config.github {
            Some(github) => Some(Arc::new(CommitApiTransport::new(
                &github.api_url,
                &github.repo,
                &github.branch,
                &github.path,
                &github.token,
                timeout,
            )?)),
            None => None,
        };

        Ok(Self {
            data_file: Arc::new(JsonFileTransport::new(config.data_file_path())),
            config: Arc::new(config),
            object_store,
            key_value,
            commit_api,
        })
    }
}
