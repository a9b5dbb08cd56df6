//! User configuration
//!
//! Tool-level settings (API endpoints, CurseForge key, network behaviour)
//! live in TOML at `~/.mmm/config.toml`. They are separate from the mod list,
//! which describes one Minecraft instance.
//!
//! # Examples
//!
//! ```no_run
//! use mmm::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! println!("Modrinth API: {}", config.modrinth.api_url);
//! println!("Retries: {}", config.network.max_retries);
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User configuration file (`~/.mmm/config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub modrinth: ModrinthConfig,

    #[serde(default)]
    pub curseforge: CurseforgeConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModrinthConfig {
    #[serde(default = "default_modrinth_url")]
    pub api_url: String,
}

fn default_modrinth_url() -> String {
    crate::modrinth::DEFAULT_BASE_URL.to_string()
}

impl Default for ModrinthConfig {
    fn default() -> Self {
        Self {
            api_url: default_modrinth_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurseforgeConfig {
    #[serde(default = "default_curseforge_url")]
    pub api_url: String,

    /// Sent as `x-api-key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_curseforge_url() -> String {
    crate::curseforge::DEFAULT_BASE_URL.to_string()
}

impl Default for CurseforgeConfig {
    fn default() -> Self {
        Self {
            api_url: default_curseforge_url(),
            api_key: None,
        }
    }
}

/// Outbound request behaviour shared by every catalog client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// 0 disables rate limiting
    #[serde(default)]
    pub requests_per_second: u32,

    /// Retries after a 5xx response
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,

    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_metadata_timeout_secs() -> u64 {
    15
}

fn default_download_timeout_secs() -> u64 {
    300
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 0,
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// Uses MMM_CONFIG_DIR if set, otherwise ~/.mmm/config.toml
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(config_dir) = std::env::var("MMM_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("Could not find home directory".to_string()))?;

        Ok(home.join(".mmm").join("config.toml"))
    }

    /// Load config from file, or the defaults if it doesn't exist
    ///
    /// Environment variable overrides:
    /// - `MODRINTH_API_URL`: Overrides `modrinth.api_url`
    /// - `CURSEFORGE_API_URL`: Overrides `curseforge.api_url`
    /// - `CURSEFORGE_API_KEY`: Overrides `curseforge.api_key`
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Self::default_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply non-empty values from `lookup` over the file settings
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("MODRINTH_API_URL") {
            self.modrinth.api_url = url;
        }
        if let Some(url) = non_empty("CURSEFORGE_API_URL") {
            self.curseforge.api_url = url;
        }
        if let Some(key) = non_empty("CURSEFORGE_API_KEY") {
            self.curseforge.api_key = Some(key);
        }
    }
}
