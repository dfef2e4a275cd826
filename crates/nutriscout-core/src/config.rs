use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::coordinator::DEFAULT_PAGE_SIZE;

/// Main configuration structure
///
/// Loaded from the config file, then CLI flags and env vars win over it.
/// Priority: CLI > Env > File > Defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Load config from the default location, or defaults if there's no file
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            // No config file? Use defaults
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save config to the default location
    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `<config_dir>/nutriscout/config.toml`, XDG on Linux, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?;

        Ok(config_dir.join("nutriscout").join("config.toml"))
    }

    /// Where the product database lives: the configured path or the data dir
    pub fn db_path(&self) -> crate::Result<PathBuf> {
        if let Some(path) = &self.cache.db_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find data directory".into()))?;

        Ok(data_dir.join("nutriscout").join("products.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Base URL of the catalog API, without a trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// SQLite database file. Unset means the platform data dir.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// How many products a listing refresh pulls
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            page_size: default_page_size(),
        }
    }
}
