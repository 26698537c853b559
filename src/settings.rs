// src/settings.rs

//! Key/value settings store shared with the host environment
//!
//! The engine reads and writes a handful of project settings (the resolved
//! runtime version). The host decides where those live; this crate ships a
//! TOML file store and an in-memory store.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings key holding the resolved runtime version string
pub const RUNTIME_VERSION_KEY: &str = "runtime.version";

/// Read/write key-value settings
pub trait SettingsStore {
    /// Get a value, `None` if unset
    fn get(&self, key: &str) -> Option<String>;

    /// Set and persist a value
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Settings persisted as a flat TOML table of strings
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSettings {
    /// Open a settings file; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse settings {}: {e}", path.display()))
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    /// Settings file for a project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        Self::open(project_root.join(".cpbundle").join("settings.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(&self.values)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {e}")))?;
        std::fs::write(&self.path, content)?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }
}

/// Non-persistent settings, for tests and one-shot runs
#[derive(Debug, Default, Clone)]
pub struct MemorySettings {
    values: BTreeMap<String, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(key: &str, value: &str) -> Self {
        let mut values = BTreeMap::new();
        values.insert(key.to_string(), value.to_string());
        Self { values }
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
