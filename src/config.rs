//! Uploader configuration
//!
//! Stored as YAML in the user's config directory.
//! Default location: ~/.config/docs-uploader/config.yaml
//!
//! The backend address can be overridden with the `DOCS_API_URL`
//! environment variable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_URL_ENV: &str = "DOCS_API_URL";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the docs backend
    pub api_base_url: String,
    /// Seconds between polling rounds
    pub poll_interval_secs: u64,
    /// Drop a session after this many consecutive failed polls.
    /// Unset means keep polling until the app is closed.
    pub max_poll_failures: Option<u32>,
    /// Per-request timeout; unset uses the HTTP client default
    pub request_timeout_secs: Option<u64>,
    /// Where downloaded documentation archives are written
    pub download_dir: PathBuf,
    /// Open each archive with the system handler once saved
    pub open_after_download: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval_secs: 2,
            max_poll_failures: None,
            request_timeout_secs: None,
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            open_after_download: false,
        }
    }
}

/// How the polling loop paces itself and when it gives up on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_consecutive_failures: None,
        }
    }
}

impl ClientConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            // a zero period would make tokio's interval panic
            interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            max_consecutive_failures: self.max_poll_failures.filter(|n| *n > 0),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Replace the base URL with `value` when it is set and non-blank.
    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            log::info!("Using backend URL from {}: {}", API_URL_ENV, url);
            self.api_base_url = url;
        }
    }
}

/// Returns: ~/.config/docs-uploader/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("docs-uploader")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> ClientConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return ClientConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents).unwrap_or_else(|e| {
            log::warn!("load_config: Failed to parse config: {}. Using defaults.", e);
            ClientConfig::default()
        }),
        Err(e) => {
            log::warn!("load_config: Failed to read config file: {}. Using defaults.", e);
            ClientConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<ClientConfig, serde_yaml::Error> {
    // an empty file deserialises to null, not to an empty mapping
    if contents.trim().is_empty() {
        return Ok(ClientConfig::default());
    }
    serde_yaml::from_str(contents)
}

/// Defaults, then the YAML file, then the environment.
pub fn load_effective_config() -> ClientConfig {
    let mut config = load_config(&default_config_path());
    config.apply_api_url_override(std::env::var(API_URL_ENV).ok());
    config
}
