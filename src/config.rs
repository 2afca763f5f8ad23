//! Configuration management for castsync
//!
//! Handles config file loading/saving.
//! Config is stored at ~/.config/castsync/config.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default media-server base URL when nothing is configured
const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Default stream port used when the network-info endpoint is unreachable
const DEFAULT_STREAM_PORT: u16 = 8000;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Media-server base URL
    pub server_url: Option<String>,
    /// Default Chromecast device name
    pub default_device: Option<String>,
    /// Path to the catt binary
    pub catt_path: Option<String>,
    /// Path to the mpv binary
    pub mpv_path: Option<String>,
    /// Fallback stream port when network-info is unavailable
    pub stream_port: Option<u16>,
    /// Set from the --server flag; outranks the env var and the file
    #[serde(skip)]
    pub server_url_override: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            default_device: None,
            catt_path: None,
            mpv_path: None,
            stream_port: None,
            server_url_override: None,
        }
    }
}

impl Config {
    /// Get config file path (~/.config/castsync/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("castsync").join("config.toml"))
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path =
            Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Server URL with fallback chain: --server flag, CASTSYNC_SERVER env
    /// var, config file, built-in default
    pub fn server_url(&self) -> String {
        if let Some(url) = &self.server_url_override {
            return url.clone();
        }
        if let Ok(url) = std::env::var("CASTSYNC_SERVER") {
            return url;
        }
        self.server_url
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    /// catt binary path, defaulting to whatever is on PATH
    pub fn catt_path(&self) -> String {
        self.catt_path.clone().unwrap_or_else(|| "catt".to_string())
    }

    /// mpv binary path, defaulting to whatever is on PATH
    pub fn mpv_path(&self) -> String {
        self.mpv_path.clone().unwrap_or_else(|| "mpv".to_string())
    }

    /// Fallback stream port
    pub fn stream_port(&self) -> u16 {
        self.stream_port.unwrap_or(DEFAULT_STREAM_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert!(config.default_device.is_none());
        assert_eq!(config.catt_path(), "catt");
        assert_eq!(config.mpv_path(), "mpv");
        assert_eq!(config.stream_port(), DEFAULT_STREAM_PORT);
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = Config {
            server_url: Some("http://10.0.0.2:9000".into()),
            default_device: Some("Living Room TV".into()),
            catt_path: None,
            mpv_path: None,
            stream_port: Some(9000),
            server_url_override: None,
        };

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.server_url.as_deref(), Some("http://10.0.0.2:9000"));
        assert_eq!(parsed.default_device.as_deref(), Some("Living Room TV"));
        assert_eq!(parsed.stream_port, Some(9000));
    }
}
