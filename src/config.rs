//! Configuration management for Slackline
//!
//! Handles persistent settings: API endpoint, timeouts, cache lifetime and
//! the default workspace. Supports Windows, macOS, and Linux.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::{CacheStore, CACHE_FILE_NAME, DEFAULT_TTL};
use crate::slack::{SlackClientConfig, DEFAULT_API_BASE_URL};

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Errors that can occur while saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No per-user config directory on this platform
    #[error("Could not determine config path")]
    NoConfigDir,

    /// Filesystem failure
    #[error("Failed to write config: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Slack Web API base URL
    pub api_base_url: String,
    /// How long cached entities stay valid, in seconds
    pub cache_ttl_secs: u64,
    /// HTTP request timeout in seconds; 0 disables it
    pub request_timeout_secs: u64,
    /// Workspace used when `--workspace` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_workspace: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            request_timeout_secs: 30,
            default_workspace: None,
        }
    }
}

impl AppConfig {
    /// Gets the config directory path (cross-platform)
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join("Slackline"))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support/Slackline"))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join("slackline"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    /// Gets the default config file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Gets the cache file path
    pub fn cache_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CACHE_FILE_NAME))
    }

    /// Loads configuration from the default path
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Loads configuration from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Saves configuration to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Saves configuration to `path`, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Cache time-to-live
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Slack client settings derived from this config
    pub fn client_config(&self) -> SlackClientConfig {
        SlackClientConfig {
            api_base_url: self.api_base_url.trim_end_matches('/').to_string(),
            timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
        }
    }

    /// Cache store at the default cache path
    pub fn cache_store(&self) -> Result<CacheStore, ConfigError> {
        let path = Self::cache_path().ok_or(ConfigError::NoConfigDir)?;
        Ok(CacheStore::new(path, self.cache_ttl()))
    }
}
