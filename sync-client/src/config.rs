//! Configuration loading for albumsync clients.
//!
//! Configuration is loaded from a TOML file (default: `albumsync.toml`).
//! Every field has a default, so an empty file or a missing section is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use albumsync_core::BackoffPolicy;

use crate::channel::ChannelConfig;

/// Root configuration for an albumsync client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Photo service API.
    #[serde(default)]
    pub api: ApiConfig,
    /// Realtime channel.
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// Photo service API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the service (default: http://localhost:8000).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Realtime channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RealtimeConfig {
    /// Base endpoint; the client id is appended (default: ws://localhost:8000/ws).
    #[serde(default = "default_realtime_url")]
    pub url: String,
    /// Delay before the first reconnect in milliseconds (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Reconnects attempted before giving up (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_realtime_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_realtime_url(),
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ApiConfig {
    /// Per-request deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RealtimeConfig {
    /// Reconnect schedule.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(self.base_delay_ms), self.max_attempts)
    }

    /// Settings for the channel manager.
    pub fn channel(&self) -> ChannelConfig {
        ChannelConfig::new(self.url.clone()).with_backoff(self.backoff())
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = ClientConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.realtime.backoff(), BackoffPolicy::default());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[api]
base_url = "https://photos.example.com"
timeout_ms = 5000

[realtime]
url = "wss://photos.example.com/ws"
base_delay_ms = 250
max_attempts = 8
"#;

        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url, "https://photos.example.com");
        assert_eq!(config.api.timeout(), Duration::from_millis(5000));

        let channel = config.realtime.channel();
        assert_eq!(channel.url, "wss://photos.example.com/ws");
        assert_eq!(channel.backoff.base_delay, Duration::from_millis(250));
        assert_eq!(channel.backoff.max_attempts, 8);
    }

    #[test]
    fn config_missing_sections_use_defaults() {
        let config: ClientConfig = toml::from_str("[api]\ntimeout_ms = 100\n").unwrap();
        assert_eq!(config.api.timeout_ms, 100);
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.realtime, RealtimeConfig::default());
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[realtime]\nmax_attempts = 2").unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.realtime.max_attempts, 2);
    }

    #[test]
    fn from_file_reports_path_on_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api\nbase_url = ").unwrap();

        let err = ClientConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());

        let err = ClientConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
