use std::env;
use std::path::PathBuf;
use std::time::Duration;

use folio_core::config::{DEFAULT_DOCUMENT_ID, DEFAULT_DOCUMENT_PATH};
use folio_core::transport::DEFAULT_COMMIT_API_URL;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 127.0.0.1)
    pub host: String,
    /// Server port (default: 3001)
    pub port: u16,
    /// Directory served as the static site (default: .)
    pub site_root: PathBuf,
    /// Data file, relative to the site root unless absolute (default: website-data.json)
    pub data_file: PathBuf,
    /// Image directory, relative to the site root (default: assets/images)
    pub images_dir: String,
    /// CORS allowed origins (comma-separated, `*` for any)
    pub cors_origins: Vec<String>,
    /// Timeout for calls to hosted backends in seconds (default: 5)
    pub timeout_secs: u64,
    /// Blob store used by `/api/update-website`
    pub blob: Option<BlobConfig>,
    /// Key-value entry used by `/api/get-website`
    pub kv: Option<KvConfig>,
    /// Repository used by `/api/update-website-github`
    pub github: Option<GithubConfig>,
}

/// Blob store credentials
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Blob API base URL
    pub api_url: String,
    /// Object name (default: website-data.json)
    pub pathname: String,
    /// Public address of the object, if known
    pub public_url: Option<String>,
    /// Bearer token
    pub token: String,
}

/// Key-value REST credentials
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// REST endpoint
    pub url: String,
    /// Bearer token
    pub token: String,
    /// Entry key (default: websiteData)
    pub key: String,
}

/// Repository contents API credentials
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// API base URL (default: https://api.github.com)
    pub api_url: String,
    /// Repository as `owner/name`
    pub repo: String,
    /// Branch (default: main)
    pub branch: String,
    /// File path inside the repository (default: website-data.json)
    pub path: String,
    /// Access token
    pub token: String,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` first
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let host = var("HOST").unwrap_or(defaults.host);
        let port = match var("PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };
        let timeout_secs = match var("BACKEND_TIMEOUT_SECS") {
            Some(secs) => secs.parse().map_err(|_| ConfigError::InvalidTimeout)?,
            None => defaults.timeout_secs,
        };

        let site_root = var("SITE_ROOT").map(PathBuf::from).unwrap_or(defaults.site_root);
        let data_file = var("DATA_FILE").map(PathBuf::from).unwrap_or(defaults.data_file);
        let images_dir = var("IMAGES_DIR")
            .map(|dir| dir.trim_matches('/').to_string())
            .unwrap_or(defaults.images_dir);

        let cors_origins = match var("CORS_ORIGINS") {
            Some(origins) => origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let blob = match (var("BLOB_API_URL"), var("BLOB_TOKEN")) {
            (Some(api_url), Some(token)) => Some(BlobConfig {
                api_url,
                pathname: var("BLOB_PATHNAME")
                    .unwrap_or_else(|| DEFAULT_DOCUMENT_PATH.to_string()),
                public_url: var("BLOB_PUBLIC_URL"),
                token,
            }),
            _ => None,
        };

        let kv = match (var("KV_REST_API_URL"), var("KV_REST_API_TOKEN")) {
            (Some(url), Some(token)) => Some(KvConfig {
                url,
                token,
                key: var("KV_KEY").unwrap_or_else(|| DEFAULT_DOCUMENT_ID.to_string()),
            }),
            _ => None,
        };

        let github = match (var("GITHUB_TOKEN"), var("GITHUB_REPO")) {
            (Some(token), Some(repo)) => Some(GithubConfig {
                api_url: var("GITHUB_API_URL")
                    .unwrap_or_else(|| DEFAULT_COMMIT_API_URL.to_string()),
                repo,
                branch: var("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
                path: var("GITHUB_PATH").unwrap_or_else(|| DEFAULT_DOCUMENT_PATH.to_string()),
                token,
            }),
            _ => None,
        };

        Ok(Config {
            host,
            port,
            site_root,
            data_file,
            images_dir,
            cors_origins,
            timeout_secs,
            blob,
            kv,
            github,
        })
    }

    /// A configuration serving `site_root` with no hosted backends
    pub fn for_site(site_root: impl Into<PathBuf>) -> Self {
        Self {
            site_root: site_root.into(),
            ..Self::default()
        }
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Absolute-or-site-relative location of the data file
    pub fn data_file_path(&self) -> PathBuf {
        self.site_root.join(&self.data_file)
    }

    /// Directory uploaded images are written to
    pub fn images_path(&self) -> PathBuf {
        self.site_root.join(&self.images_dir)
    }

    /// Site-relative reference returned for an uploaded image
    pub fn image_reference(&self, filename: &str) -> String {
        if self.images_dir.is_empty() {
            format!("./{}", filename)
        } else {
            format!("./{}/{}", self.images_dir, filename)
        }
    }

    /// Timeout applied to hosted backend calls
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether every origin is allowed
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            site_root: PathBuf::from("."),
            data_file: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            images_dir: "assets/images".to_string(),
            cors_origins: vec!["*".to_string()],
            timeout_secs: 5,
            blob: None,
            kv: None,
            github: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidTimeout,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "Invalid PORT environment variable"),
            ConfigError::InvalidTimeout => {
                write!(f, "Invalid BACKEND_TIMEOUT_SECS environment variable")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_addr(), "127.0.0.1:3001");
        assert_eq!(config.data_file_path(), PathBuf::from("./website-data.json"));
        assert_eq!(config.image_reference("a.png"), "./assets/images/a.png");
        assert!(config.allows_any_origin());
        assert!(config.blob.is_none() && config.kv.is_none() && config.github.is_none());
    }

    #[test]
    fn test_backends_need_both_url_and_token() {
        let config = Config::from_lookup(lookup(&[
            ("KV_REST_API_URL", "https://kv.example"),
            ("GITHUB_TOKEN", "ghp"),
            ("GITHUB_REPO", "me/site"),
            ("BLOB_TOKEN", "blob"),
        ]))
        .unwrap();
        assert!(config.kv.is_none());
        assert!(config.blob.is_none());
        let github = config.github.unwrap();
        assert_eq!(github.branch, "main");
        assert_eq!(github.path, "website-data.json");
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup(&[("PORT", "web")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort));
    }

    #[test]
    fn test_image_dir_slashes_trimmed() {
        let config = Config::from_lookup(lookup(&[("IMAGES_DIR", "/img/")])).unwrap();
        assert_eq!(config.image_reference("x.jpg"), "./img/x.jpg");
    }
}
