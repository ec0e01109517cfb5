use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TlsBackend {
    Rustls,
    NativeTls,
}

impl Default for TlsBackend {
    fn default() -> Self {
        Self::Rustls
    }
}

/// Admin console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// kiro.rs server base URL (without the `/api/admin` suffix)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Admin API key, sent with every request
    #[serde(default)]
    pub admin_api_key: Option<String>,

    #[serde(default = "default_tls_backend")]
    pub tls_backend: TlsBackend,

    /// HTTP proxy URL (optional)
    /// Supported formats: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Proxy authentication username (optional)
    #[serde(default)]
    pub proxy_username: Option<String>,

    /// Proxy authentication password (optional)
    #[serde(default)]
    pub proxy_password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Credentials shown per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Listing auto-refresh interval in seconds
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Directory export files are written to (defaults to the working directory)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<String>,

    /// Config file path (runtime metadata, not written to JSON)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_tls_backend() -> TlsBackend {
    TlsBackend::Rustls
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    20
}

fn default_refresh_interval_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            admin_api_key: None,
            tls_backend: default_tls_backend(),
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            request_timeout_secs: default_request_timeout_secs(),
            page_size: default_page_size(),
            refresh_interval_secs: default_refresh_interval_secs(),
            export_dir: None,
            config_path: None,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// Root of the admin API, e.g. `http://127.0.0.1:8080/api/admin`
    pub fn admin_base_url(&self) -> String {
        format!("{}/api/admin", self.base_url.trim_end_matches('/'))
    }

    /// Page size, never zero
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.max(1)
    }

    /// Export directory, falls back to the working directory
    pub fn effective_export_dir(&self) -> &Path {
        self.export_dir
            .as_deref()
            .map(Path::new)
            .unwrap_or_else(|| Path::new("."))
    }

    /// Get API key if a non-blank one is configured
    pub fn api_key(&self) -> Option<&str> {
        self.admin_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // Config file doesn't exist, return default config
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get config file path (if available)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
