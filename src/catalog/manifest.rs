// src/catalog/manifest.rs

//! Bundle manifest JSON
//!
//! The published manifest maps package name to metadata. Only `version` is
//! authoritative here; the remaining fields are carried for display.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Manifest metadata for one package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// True for multi-file (directory) packages
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub package: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pypi_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_dependencies: Option<Vec<String>>,
}

impl ManifestEntry {
    /// Entry carrying only a version
    pub fn with_version(version: &str) -> Self {
        Self {
            version: Some(version.to_string()),
            ..Default::default()
        }
    }
}

/// Package name to metadata
pub type Manifest = BTreeMap<String, ManifestEntry>;

/// Read and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Manifest(format!("{}: {e}", path.display())))?;
    parse_manifest(&content).map_err(|e| Error::Manifest(format!("{}: {e}", path.display())))
}

/// Parse manifest JSON
pub fn parse_manifest(content: &str) -> std::result::Result<Manifest, serde_json::Error> {
    serde_json::from_str(content)
}

/// Write a manifest, replacing the file atomically
pub fn save_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Manifest(format!("{} has no parent directory", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new().prefix(".manifest-").tempfile_in(dir)?;
    serde_json::to_writer_pretty(temp.as_file_mut(), manifest)?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
