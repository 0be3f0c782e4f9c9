//! Application configuration management.
//!
//! Configuration is stored at `~/.config/coindash/config.json`. The backend
//! URL can be overridden with the `COINDASH_API_BASE_URL` environment
//! variable.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileStore, KeyValueStore, KeyringStore};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "coindash";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// File used by the file storage backend
const STORE_FILE: &str = "store.json";

pub const API_BASE_URL_ENV: &str = "COINDASH_API_BASE_URL";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Where tokens and preferences are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Keyring,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub last_username: Option<String>,
    pub storage_backend: StorageBackend,
    /// Base URL from the environment; never written back to the file
    #[serde(skip)]
    pub api_base_url_override: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_username: None,
            storage_backend: StorageBackend::default(),
            api_base_url_override: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(std::env::var(API_BASE_URL_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, base_url: Option<String>) {
        self.api_base_url_override = base_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
    }

    /// Backend URL in effect: the environment override, else the saved value.
    pub fn base_url(&self) -> &str {
        self.api_base_url_override
            .as_deref()
            .unwrap_or(&self.api_base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Directory for rolling log files
    pub fn log_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("logs"))
    }

    /// Open the configured key-value backend.
    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>> {
        Ok(match self.storage_backend {
            StorageBackend::Keyring => Arc::new(KeyringStore::new()),
            StorageBackend::File => Arc::new(FileStore::new(Self::config_dir()?.join(STORE_FILE))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.storage_backend, StorageBackend::Keyring);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"storage_backend":"file","last_username":"alice"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::File);
        assert_eq!(config.last_username.as_deref(), Some("alice"));
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_base_url: "https://api.example.com".to_string(),
            last_username: Some("bob".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, "https://api.example.com");
        assert_eq!(loaded.last_username.as_deref(), Some("bob"));
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_env(Some("  ".to_string()));
        assert_eq!(config.base_url(), DEFAULT_API_BASE_URL);

        config.apply_env(Some("http://staging:9000/api".to_string()));
        assert_eq!(config.base_url(), "http://staging:9000/api");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_env_override_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        Config {
            api_base_url: "https://api.example.com".to_string(),
            ..Default::default()
        }
        .save_to(&path)
        .unwrap();

        let mut config = Config::load_from(&path).unwrap();
        config.apply_env(Some("http://staging.example/api".to_string()));
        config.last_username = Some("alice".to_string());
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.base_url(), "https://api.example.com");
        assert_eq!(reloaded.last_username.as_deref(), Some("alice"));
        assert!(!std::fs::read_to_string(&path).unwrap().contains("staging"));
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config = Config {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
