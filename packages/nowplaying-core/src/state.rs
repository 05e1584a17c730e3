//! Core configuration.
//!
//! [`Config`] holds every tunable the core services need. The server binary
//! builds it from YAML, environment and CLI overrides; tests usually start
//! from [`Config::default`] and point the directories at a temp dir.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the now-playing core.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Broadcast
    /// Interface the subscriber listener binds to.
    pub bind_host: String,

    /// Port of the subscriber listener (0 = auto-allocate).
    pub tcp_port: u16,

    // Metadata pipe
    /// Path of the metadata pipe (usually a FIFO).
    pub pipe_path: PathBuf,

    /// Fixed delay before reopening the pipe after it closed (seconds).
    pub pipe_retry_secs: u64,

    /// Bytes requested per pipe read.
    pub pipe_read_chunk: usize,

    /// Whether to run the pipe source at all.
    pub enable_pipe: bool,

    // Art cache
    /// Directory holding resized thumbnails.
    pub art_cache_dir: PathBuf,

    /// Prefix prepended to thumbnail file names to form art references.
    pub art_url_prefix: String,

    /// Directory where raw pipe artwork is staged before resizing.
    pub art_staging_dir: PathBuf,

    /// Edge length of the square thumbnails (pixels).
    pub thumbnail_size: u32,

    /// Timeout for remote artwork fetches (seconds).
    pub art_fetch_timeout_secs: u64,

    // Mock source
    /// Whether to run the scripted demo source.
    pub enable_mock: bool,

    /// Interval between scripted demo steps (seconds).
    pub mock_interval_secs: u64,
}

impl Config {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any value would cause runtime issues.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipe_read_chunk == 0 {
            return Err(ConfigError("pipe_read_chunk must be >= 1".to_string()));
        }
        if self.thumbnail_size == 0 {
            return Err(ConfigError("thumbnail_size must be >= 1".to_string()));
        }
        if self.art_url_prefix.is_empty() {
            return Err(ConfigError("art_url_prefix must not be empty".to_string()));
        }
        if self.enable_mock && self.mock_interval_secs == 0 {
            return Err(ConfigError("mock_interval_secs must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Backoff between pipe reopen attempts.
    #[must_use]
    pub fn pipe_retry_delay(&self) -> Duration {
        Duration::from_secs(self.pipe_retry_secs)
    }

    /// `host:port` string for the subscriber listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.tcp_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            tcp_port: 9000,
            pipe_path: PathBuf::from("/tmp/shairport-sync-metadata"),
            pipe_retry_secs: 5,
            pipe_read_chunk: 4096,
            enable_pipe: true,
            art_cache_dir: PathBuf::from("/tmp/art_cache"),
            art_url_prefix: "/art/".to_string(),
            art_staging_dir: PathBuf::from("/tmp/shairport_art_cache"),
            thumbnail_size: 128,
            art_fetch_timeout_secs: 10,
            enable_mock: false,
            mock_interval_secs: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_thumbnail_size_is_rejected() {
        let config = Config {
            thumbnail_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_mock_interval_only_matters_when_enabled() {
        let mut config = Config {
            mock_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.enable_mock = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_like_input_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"tcp_port": 4000}"#).unwrap();
        assert_eq!(config.tcp_port, 4000);
        assert_eq!(config.thumbnail_size, 128);
        assert_eq!(config.bind_addr(), "0.0.0.0:4000");
    }
}
