// src/config.rs

//! Bundle engine configuration
//!
//! Loaded from `<config-dir>/cpbundle/config.toml` (or an explicit path).
//! Every field has a default, so a missing file yields the published
//! Adafruit CircuitPython bundle settings.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "CPBUNDLE_CACHE_DIR";

/// Suffix of the plain-source bundle variant
pub const SOURCE_SUFFIX: &str = "py";

/// Configuration for fetching and caching the bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Repository URL the release archives are downloaded from
    pub repo_url: String,
    /// API URL used to discover the latest release
    pub api_url: String,
    /// Archive/manifest base name
    pub bundle_name: String,
    /// Variant suffixes to download for every tag
    pub suffixes: Vec<String>,
    /// Cache root; `None` uses the platform cache directory
    pub cache_root: Option<PathBuf>,
    /// Timeout for a single HTTP request, in seconds
    pub http_timeout_secs: u64,
    /// Attempts per request before giving up on transport errors
    pub max_retries: u32,
    /// Show download progress bars
    pub progress: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/adafruit/Adafruit_CircuitPython_Bundle".to_string(),
            api_url: "https://api.github.com/repos/adafruit/Adafruit_CircuitPython_Bundle"
                .to_string(),
            bundle_name: "adafruit-circuitpython-bundle".to_string(),
            suffixes: vec![
                SOURCE_SUFFIX.to_string(),
                "9.x-mpy".to_string(),
                "10.x-mpy".to_string(),
            ],
            cache_root: None,
            http_timeout_secs: 30,
            max_retries: 3,
            progress: true,
        }
    }
}

impl BundleConfig {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cpbundle").join("config.toml"))
    }

    /// Load configuration from a TOML file, falling back to defaults if absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        let config: BundleConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config file {}: {e}", path.display()))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise from the default location
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match Self::default_path() {
                Some(p) => Self::load(&p),
                None => Ok(Self::default()),
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.suffixes.is_empty() {
            return Err(Error::Config("at least one bundle suffix is required".to_string()));
        }
        if let Some(bad) = self
            .suffixes
            .iter()
            .find(|s| s.is_empty() || s.contains('/') || s.contains(".."))
        {
            return Err(Error::Config(format!("invalid bundle suffix: {bad:?}")));
        }
        if self.bundle_name.is_empty() {
            return Err(Error::Config("bundle_name must not be empty".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::Config("http_timeout_secs must be positive".to_string()));
        }
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Request timeout as a `Duration`
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Resolved cache root: env override, then config, then platform cache dir
    pub fn cache_root(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            if !dir.is_empty() {
                return PathBuf::from(dir);
            }
        }
        self.cache_root.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("cpbundle")
        })
    }
}
