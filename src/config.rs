use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const BACKEND_URL_ENV: &str = "A11Y_BRIDGE_BACKEND_URL";

const APP_DIR: &str = "a11y-bridge";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Path error: {0}")]
    PathError(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Runtime configuration, stored as JSON next to the other app config.
///
/// Every field has a default so older files keep loading after new fields are added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base of every backend endpoint, without a trailing slash.
    pub backend_url: String,
    pub request_timeout_secs: u64,
    /// Root the packaged cursor images and overlay document are served from.
    pub extension_base_url: String,
    pub vendor_html_attempts: u32,
    pub vendor_html_interval_ms: u64,
    pub review_wait_timeout_ms: u64,
    pub review_retry_delay_ms: u64,
    /// Default `tracing` directive; `RUST_LOG` still wins.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: "https://voim.store/api/v1".to_string(),
            request_timeout_secs: 30,
            extension_base_url: "chrome-extension://a11y-bridge".to_string(),
            vendor_html_attempts: 10,
            vendor_html_interval_ms: 500,
            review_wait_timeout_ms: 10_000,
            review_retry_delay_ms: 5_000,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// `<config_dir>/a11y-bridge/config.json`
    pub fn default_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::PathError("Cannot determine config directory".into())
        })?;
        Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location and apply environment overrides.
    pub async fn load() -> ConfigResult<Self> {
        let path = Self::default_path()?;
        let config = Self::load_from(&path)
            .await?
            .with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Missing file means defaults.
    pub async fn load_from(path: &Path) -> ConfigResult<Self> {
        if !tokio::fs::try_exists(path).await? {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(self)?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    /// Apply overrides looked up by environment variable name.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(backend_url = %url, "Backend url overridden from environment");
            self.backend_url = url.trim().to_string();
        }
        self.backend_url = self.backend_url.trim_end_matches('/').to_string();
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "backend_url",
                reason: format!("expected an http(s) url, got {:?}", self.backend_url),
            });
        }
        if self.vendor_html_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "vendor_html_attempts",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn vendor_html_interval(&self) -> Duration {
        Duration::from_millis(self.vendor_html_interval_ms)
    }

    pub fn review_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.review_wait_timeout_ms)
    }

    pub fn review_retry_delay(&self) -> Duration {
        Duration::from_millis(self.review_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.json")).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.backend_url, "https://voim.store/api/v1");
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AppConfig {
            review_retry_delay_ms: 10,
            ..AppConfig::default()
        };
        config.save_to(&path).await.unwrap();

        let loaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "backend_url": "http://localhost:8080" }"#)
            .await
            .unwrap();

        let loaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.backend_url, "http://localhost:8080");
        assert_eq!(loaded.vendor_html_attempts, 10);
    }

    #[test]
    fn test_env_override_and_trailing_slash() {
        let config = AppConfig::default().with_overrides(|key| {
            (key == BACKEND_URL_ENV).then(|| "http://127.0.0.1:9000/api/".to_string())
        });
        assert_eq!(config.backend_url, "http://127.0.0.1:9000/api");

        let untouched = AppConfig::default().with_overrides(|_| None);
        assert_eq!(untouched.backend_url, "https://voim.store/api/v1");
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = AppConfig {
            backend_url: "voim.store".into(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "backend_url", .. })
        ));
    }
}
