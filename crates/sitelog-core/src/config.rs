//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the backend URL, the last used username and request/cache timings.
//!
//! Configuration is stored at `~/.config/sitelog/config.json`. The
//! `SITELOG_API_URL` and `SITELOG_USERNAME` environment variables take
//! precedence over the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::cache::DEFAULT_STALE_SECS;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "sitelog";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

pub const ENV_API_URL: &str = "SITELOG_API_URL";
pub const ENV_USERNAME: &str = "SITELOG_USERNAME";
pub const ENV_PASSWORD: &str = "SITELOG_PASSWORD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub last_username: Option<String>,
    pub request_timeout_secs: u64,
    pub stale_time_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            last_username: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            stale_time_secs: DEFAULT_STALE_SECS,
        }
    }
}

impl Config {
    /// Load from disk, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(username) = var(ENV_USERNAME).filter(|v| !v.trim().is_empty()) {
            self.last_username = Some(username);
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding `session.json`.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }
}
