//! Configuration for folio.
//!
//! [`Config`] is persisted as TOML, by default at
//! `~/.config/folio/config.toml` on Unix systems. Backend sections are
//! optional; a backend without a section is simply not used. Credentials can
//! be kept out of the file and supplied through the environment instead:
//!
//! | Variable | Overrides |
//! |---|---|
//! | `FOLIO_BLOB_TOKEN` | `object_store.token` |
//! | `FOLIO_KV_TOKEN` | `key_value.token` |
//! | `GITHUB_TOKEN` | `commit_api.token` |
//! | `GITHUB_REPO` | `commit_api.repo` |
//! | `GITHUB_BRANCH` | `commit_api.branch` |
//!
//! # Example
//!
//! ```toml
//! data_dir = "/home/me/.local/share/folio"
//!
//! [local_server]
//! url = "http://localhost:3001"
//!
//! [commit_api]
//! repo = "me/portfolio"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::FileCache;
use crate::error::{FolioError, Result};
use crate::load::LoadOrchestrator;
use crate::save::{SaveOrchestrator, SavePolicy};
use crate::transport::{
    CommitApiTransport, DEFAULT_COMMIT_API_URL, DEFAULT_LOCAL_SERVER_URL, JsonFileTransport,
    KeyValueTransport, LocalServerTransport, ObjectStoreTransport, SyncTransport,
};

/// Default cache key, shared with the browser build of the site.
pub const DEFAULT_DOCUMENT_ID: &str = "websiteData";

/// Default file name of the published document.
pub const DEFAULT_DOCUMENT_PATH: &str = "website-data.json";

/// User-editable settings for the CLI and library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the local cache
    pub data_dir: PathBuf,

    /// Cache key of the document
    #[serde(default = "default_document_id")]
    pub document_id: String,

    /// Path of the JSON file read on load when nothing else has a document
    #[serde(default = "default_document_path")]
    pub document_path: PathBuf,

    /// Timeout for every remote call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries granted to cloud backends that are unavailable
    #[serde(default = "default_retry_unavailable")]
    pub retry_unavailable: u32,

    /// Stop after the local server accepted a save
    #[serde(default = "default_true")]
    pub stop_after_sufficient: bool,

    /// Local companion server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_server: Option<LocalServerConfig>,

    /// Cloud object store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_store: Option<ObjectStoreConfig>,

    /// Cloud key-value entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_value: Option<KeyValueConfig>,

    /// Source-control commit API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_api: Option<CommitApiConfig>,
}

/// `[local_server]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalServerConfig {
    /// Base URL of the server
    #[serde(default = "default_local_server_url")]
    pub url: String,
}

impl Default for LocalServerConfig {
    fn default() -> Self {
        Self {
            url: default_local_server_url(),
        }
    }
}

/// `[object_store]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Blob API root; the object is written to `{api_url}/{pathname}`
    pub api_url: String,
    /// Object name
    #[serde(default = "default_document_path_string")]
    pub pathname: String,
    /// Public address of the object, enabling reads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// `[key_value]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValueConfig {
    /// REST endpoint
    pub url: String,
    /// Key holding the document
    #[serde(default = "default_document_id")]
    pub key: String,
    /// Bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// `[commit_api]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitApiConfig {
    /// API root
    #[serde(default = "default_commit_api_url")]
    pub api_url: String,
    /// Repository as `owner/name`
    #[serde(default)]
    pub repo: String,
    /// Branch to commit to
    #[serde(default = "default_branch")]
    pub branch: String,
    /// File path inside the repository
    #[serde(default = "default_document_path_string")]
    pub path: String,
    /// Access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for CommitApiConfig {
    fn default() -> Self {
        Self {
            api_url: default_commit_api_url(),
            repo: String::new(),
            branch: default_branch(),
            path: default_document_path_string(),
            token: None,
        }
    }
}

fn default_document_id() -> String {
    DEFAULT_DOCUMENT_ID.to_string()
}

fn default_document_path() -> PathBuf {
    PathBuf::from(DEFAULT_DOCUMENT_PATH)
}

fn default_document_path_string() -> String {
    DEFAULT_DOCUMENT_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_retry_unavailable() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_local_server_url() -> String {
    DEFAULT_LOCAL_SERVER_URL.to_string()
}

fn default_commit_api_url() -> String {
    DEFAULT_COMMIT_API_URL.to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("folio");
        Self::new(data_dir)
    }
}

impl Config {
    /// Create a config caching under `data_dir`, with the local server as the
    /// only backend.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            document_id: default_document_id(),
            document_path: default_document_path(),
            timeout_secs: default_timeout_secs(),
            retry_unavailable: default_retry_unavailable(),
            stop_after_sufficient: true,
            local_server: Some(LocalServerConfig::default()),
            object_store: None,
            key_value: None,
            commit_api: None,
        }
    }

    /// Get the config file path (~/.config/folio/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("folio").join("config.toml"))
    }

    /// Load config from the default location, or the default if the file
    /// doesn't exist. Environment overrides are applied.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path. Environment overrides are not
    /// applied.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| FolioError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load from `path` (or the default location), falling back to the
    /// default config on any error. Environment overrides are applied.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let loaded = match path {
            Some(path) => Self::load_from(path).map(|mut c| {
                c.apply_env();
                c
            }),
            None => Self::load(),
        };
        loaded.unwrap_or_else(|e| {
            log::warn!("config: {}; using defaults", e);
            let mut config = Config::default();
            config.apply_env();
            config
        })
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(FolioError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| FolioError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply credential overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply credential overrides from `lookup`. Empty values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = get("FOLIO_BLOB_TOKEN")
            && let Some(store) = self.object_store.as_mut()
        {
            store.token = Some(token);
        }
        if let Some(token) = get("FOLIO_KV_TOKEN")
            && let Some(kv) = self.key_value.as_mut()
        {
            kv.token = Some(token);
        }

        let token = get("GITHUB_TOKEN");
        let repo = get("GITHUB_REPO");
        let branch = get("GITHUB_BRANCH");
        if self.commit_api.is_none() && token.is_some() && repo.is_some() {
            self.commit_api = Some(CommitApiConfig::default());
        }
        if let Some(commit) = self.commit_api.as_mut() {
            if let Some(token) = token {
                commit.token = Some(token);
            }
            if let Some(repo) = repo {
                commit.repo = repo;
            }
            if let Some(branch) = branch {
                commit.branch = branch;
            }
        }
    }

    /// Timeout for remote calls.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// The local cache this config points at.
    pub fn file_cache(&self) -> FileCache {
        FileCache::new(&self.data_dir, &self.document_id)
    }

    /// Save policy derived from this config.
    pub fn save_policy(&self) -> SavePolicy {
        SavePolicy {
            stop_after_sufficient: self.stop_after_sufficient,
            retry_unavailable: self.retry_unavailable,
        }
    }

    /// The local server transport, when configured.
    pub fn local_server(&self) -> Result<Option<LocalServerTransport>> {
        self.local_server
            .as_ref()
            .map(|ls| {
                let transport = LocalServerTransport::new(&ls.url, self.timeout())?;
                let served = self
                    .document_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(DEFAULT_DOCUMENT_PATH)
                    .to_string();
                Ok(transport.with_document_path(served))
            })
            .transpose()
    }

    fn object_store_transport(&self) -> Result<Option<ObjectStoreTransport>> {
        let Some(os) = &self.object_store else {
            return Ok(None);
        };
        let token = os.token.clone().unwrap_or_default();
        let mut transport = ObjectStoreTransport::new(&os.api_url, &os.pathname, token, self.timeout())?;
        if let Some(public_url) = &os.public_url {
            transport = transport.with_public_url(public_url);
        }
        Ok(Some(transport))
    }

    /// Read-only access to the published object, when it has a public address.
    fn object_store_reader(&self) -> Result<Option<ObjectStoreTransport>> {
        match self.object_store.as_ref().and_then(|os| os.public_url.as_ref()) {
            Some(public_url) => {
                ObjectStoreTransport::public_reader(public_url, self.timeout()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn key_value_transport(&self) -> Result<Option<KeyValueTransport>> {
        let Some(kv) = &self.key_value else {
            return Ok(None);
        };
        let token = kv.token.clone().unwrap_or_default();
        KeyValueTransport::new(&kv.url, &kv.key, token, self.timeout()).map(Some)
    }

    fn commit_api_transport(&self) -> Result<Option<CommitApiTransport>> {
        let Some(ca) = &self.commit_api else {
            return Ok(None);
        };
        let token = ca.token.clone().unwrap_or_default();
        CommitApiTransport::new(
            &ca.api_url,
            &ca.repo,
            &ca.branch,
            &ca.path,
            token,
            self.timeout(),
        )
        .map(Some)
    }

    /// Backends in write priority order: local server, object store,
    /// key-value entry, commit API.
    ///
    /// A backend whose credentials are missing is left out with a warning.
    pub fn write_transports(&self) -> Result<Vec<Arc<dyn SyncTransport>>> {
        let mut transports: Vec<Arc<dyn SyncTransport>> = Vec::new();
        if let Some(t) = self.local_server()? {
            transports.push(Arc::new(t));
        }
        push_configured(&mut transports, self.object_store_transport())?;
        push_configured(&mut transports, self.key_value_transport())?;
        push_configured(&mut transports, self.commit_api_transport())?;
        Ok(transports)
    }

    /// Read sources in load order: key-value entry, the object store's
    /// public address, local server, then the JSON file.
    pub fn read_sources(&self) -> Result<Vec<Arc<dyn SyncTransport>>> {
        let mut sources: Vec<Arc<dyn SyncTransport>> = Vec::new();
        push_configured(&mut sources, self.key_value_transport())?;
        push_configured(&mut sources, self.object_store_reader())?;
        if let Some(t) = self.local_server()? {
            sources.push(Arc::new(t));
        }
        sources.push(Arc::new(JsonFileTransport::new(&self.document_path)));
        Ok(sources)
    }

    /// A save orchestrator over [`write_transports`](Self::write_transports).
    pub fn save_orchestrator(&self) -> Result<SaveOrchestrator> {
        let mut orchestrator = SaveOrchestrator::new(self.save_policy());
        for transport in self.write_transports()? {
            orchestrator.add_transport(transport);
        }
        Ok(orchestrator)
    }

    /// A load orchestrator over [`read_sources`](Self::read_sources).
    pub fn load_orchestrator(&self) -> Result<LoadOrchestrator> {
        let mut orchestrator = LoadOrchestrator::new();
        for source in self.read_sources()? {
            orchestrator.add_source(source);
        }
        Ok(orchestrator)
    }
}

fn push_configured<T: SyncTransport + 'static>(
    list: &mut Vec<Arc<dyn SyncTransport>>,
    built: Result<Option<T>>,
) -> Result<()> {
    match built {
        Ok(Some(transport)) => list.push(Arc::new(transport)),
        Ok(None) => {}
        Err(FolioError::MissingCredential(what)) => {
            log::warn!("config: {} is configured without credentials; skipping it", what);
        }
        Err(e) => return Err(e),
    }
    Ok(())
}
