//! Configuration for blogharvest

mod logging;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Desktop-browser user agent sent with every page fetch.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Post store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// HTTP fetching configuration
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Harvest pipeline configuration
    #[serde(default)]
    pub harvest: HarvestConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Post store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the post database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// HTTP fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Connection timeout (seconds)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Harvest pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Maximum concurrent page fetches per batch
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Retry extraction in a headless browser when the static path finds nothing
    #[serde(default = "default_enable_rendering")]
    pub enable_rendering: bool,
    /// Overall budget for one headless page render (seconds)
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,
}

fn default_max_workers() -> usize {
    5
}

fn default_enable_rendering() -> bool {
    true
}

fn default_render_timeout_secs() -> u64 {
    10
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            enable_rendering: default_enable_rendering(),
            render_timeout_secs: default_render_timeout_secs(),
        }
    }
}
