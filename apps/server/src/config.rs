//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface the subscriber listener binds to.
    /// Override: `NOWPLAYING_BIND_HOST`
    pub bind_host: String,

    /// Port of the subscriber listener.
    /// Override: `NOWPLAYING_TCP_PORT`
    pub tcp_port: u16,

    /// Path of the shairport-sync metadata pipe.
    /// Override: `NOWPLAYING_PIPE_PATH`
    pub pipe_path: PathBuf,

    /// Seconds to wait before reopening the pipe.
    pub pipe_retry_secs: u64,

    /// Run the metadata pipe source.
    /// Override: `NOWPLAYING_ENABLE_PIPE`
    pub enable_pipe: bool,

    /// Directory holding resized thumbnails (served elsewhere under `art_url_prefix`).
    /// Override: `NOWPLAYING_ART_CACHE_DIR`
    pub art_cache_dir: PathBuf,

    /// Prefix of art references sent to subscribers.
    pub art_url_prefix: String,

    /// Directory for raw pipe artwork awaiting resizing.
    pub art_staging_dir: PathBuf,

    /// Thumbnail edge length in pixels.
    pub thumbnail_size: u32,

    /// Timeout for remote artwork fetches in seconds.
    pub art_fetch_timeout_secs: u64,

    /// Run the scripted demo source.
    /// Override: `NOWPLAYING_ENABLE_MOCK`
    pub enable_mock: bool,

    /// Seconds between demo steps.
    pub mock_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = nowplaying_core::Config::default();
        Self {
            bind_host: core.bind_host,
            tcp_port: core.tcp_port,
            pipe_path: core.pipe_path,
            pipe_retry_secs: core.pipe_retry_secs,
            enable_pipe: core.enable_pipe,
            art_cache_dir: core.art_cache_dir,
            art_url_prefix: core.art_url_prefix,
            art_staging_dir: core.art_staging_dir,
            thumbnail_size: core.thumbnail_size,
            art_fetch_timeout_secs: core.art_fetch_timeout_secs,
            enable_mock: core.enable_mock,
            mock_interval_secs: core.mock_interval_secs,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NOWPLAYING_BIND_HOST") {
            self.bind_host = val;
        }

        if let Ok(val) = std::env::var("NOWPLAYING_ART_CACHE_DIR") {
            self.art_cache_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("NOWPLAYING_ENABLE_PIPE") {
            if let Ok(enabled) = val.parse() {
                self.enable_pipe = enabled;
            }
        }

        if let Ok(val) = std::env::var("NOWPLAYING_ENABLE_MOCK") {
            if let Ok(enabled) = val.parse() {
                self.enable_mock = enabled;
            }
        }

        // Note: NOWPLAYING_TCP_PORT and NOWPLAYING_PIPE_PATH are handled by clap
        // via #[arg(env = ...)] in main.rs
    }

    /// Converts to nowplaying-core's Config type.
    pub fn to_core_config(&self) -> nowplaying_core::Config {
        nowplaying_core::Config {
            bind_host: self.bind_host.clone(),
            tcp_port: self.tcp_port,
            pipe_path: self.pipe_path.clone(),
            pipe_retry_secs: self.pipe_retry_secs,
            enable_pipe: self.enable_pipe,
            art_cache_dir: self.art_cache_dir.clone(),
            art_url_prefix: self.art_url_prefix.clone(),
            art_staging_dir: self.art_staging_dir.clone(),
            thumbnail_size: self.thumbnail_size,
            art_fetch_timeout_secs: self.art_fetch_timeout_secs,
            enable_mock: self.enable_mock,
            mock_interval_secs: self.mock_interval_secs,
            ..Default::default()
        }
    }
}
