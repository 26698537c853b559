// src/catalog/mod.rs

//! Library catalogs
//!
//! A catalog maps package name to [`Package`] for one directory of packages
//! and one manifest. The bundle side and the project side are built by the
//! same [`build_catalog`] call with different roots; catalogs are rebuilt
//! from disk rather than mutated.

mod manifest;

pub use manifest::{Manifest, ManifestEntry, load_manifest, parse_manifest, save_manifest};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::runtime::{BINARY_EXT, SOURCE_EXT};

/// Version reported for packages the manifest does not know
pub const UNKNOWN_VERSION: &str = "unknown";

/// One installable or installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub version: String,
    /// Absolute path of the file or directory
    pub location: PathBuf,
    /// Multi-file package (directory) rather than a single module
    pub is_directory: bool,
}

impl Package {
    /// File name of the package on disk
    pub fn file_name(&self) -> Option<&str> {
        self.location.file_name().and_then(|n| n.to_str())
    }

    pub fn has_known_version(&self) -> bool {
        self.version != UNKNOWN_VERSION
    }
}

/// Package name to package, ordered by name
pub type Catalog = BTreeMap<String, Package>;

/// Package name for a directory entry: the file name without a module extension
pub fn package_name(file_name: &str) -> String {
    for ext in [SOURCE_EXT, BINARY_EXT] {
        if let Some(stem) = file_name
            .strip_suffix(ext)
            .and_then(|s| s.strip_suffix('.'))
        {
            if !stem.is_empty() {
                return stem.to_string();
            }
        }
    }
    file_name.to_string()
}

/// Build a catalog from `root` and the manifest at `manifest_path`
///
/// A missing or corrupt manifest is logged and yields an empty catalog.
pub fn build_catalog(root: &Path, manifest_path: &Path) -> Catalog {
    match load_manifest(manifest_path) {
        Ok(manifest) => catalog_from_manifest(root, &manifest),
        Err(e) => {
            warn!("Treating {} as empty: {}", root.display(), e);
            Catalog::new()
        }
    }
}

/// Build a catalog from `root` with an already-parsed manifest
///
/// Lists immediate children only. Hidden entries are skipped; a missing
/// root yields an empty catalog.
pub fn catalog_from_manifest(root: &Path, manifest: &Manifest) -> Catalog {
    let mut catalog = Catalog::new();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", root.display(), e);
            return catalog;
        }
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            warn!("Skipping non-UTF-8 entry in {}", root.display());
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }

        // Follow symlinks so linked packages classify by their target
        let Ok(metadata) = fs::metadata(entry.path()) else {
            continue;
        };

        let name = package_name(file_name);
        let version = manifest
            .get(&name)
            .and_then(|e| e.version.clone())
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string());

        let location = entry.path();
        let location = location.canonicalize().unwrap_or(location);

        catalog.insert(
            name.clone(),
            Package {
                name,
                version,
                location,
                is_directory: metadata.is_dir(),
            },
        );
    }

    debug!("Catalogued {} packages in {}", catalog.len(), root.display());
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(path: &Path) {
        fs::write(
            path,
            r#"{"neopixel": {"version": "6.3.12"}, "adafruit_bus_device": {"version": "5.2.10", "package": true}}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("neopixel.py"), "neopixel");
        assert_eq!(package_name("neopixel.mpy"), "neopixel");
        assert_eq!(package_name("adafruit_bus_device"), "adafruit_bus_device");
        assert_eq!(package_name("README.txt"), "README.txt");
        assert_eq!(package_name(".py"), ".py");
        // Deriving from the same entry twice is stable
        assert_eq!(package_name("neopixel.mpy"), package_name("neopixel.mpy"));
    }

    #[test]
    fn test_build_catalog() {
        let temp = TempDir::new().unwrap();
        let lib = temp.path().join("lib");
        fs::create_dir_all(lib.join("adafruit_bus_device")).unwrap();
        fs::write(lib.join("neopixel.mpy"), b"").unwrap();
        fs::write(lib.join("custom_thing.py"), b"").unwrap();
        fs::write(lib.join(".hidden"), b"").unwrap();
        let manifest = temp.path().join("manifest.json");
        write_manifest(&manifest);

        let catalog = build_catalog(&lib, &manifest);

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog["neopixel"].version, "6.3.12");
        assert!(!catalog["neopixel"].is_directory);
        assert!(catalog["adafruit_bus_device"].is_directory);
        assert_eq!(catalog["custom_thing"].version, UNKNOWN_VERSION);
        assert!(!catalog["custom_thing"].has_known_version());
        assert!(catalog["neopixel"].location.is_absolute());
        assert_eq!(catalog["neopixel"].file_name(), Some("neopixel.mpy"));
    }

    #[test]
    fn test_build_catalog_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let lib = temp.path().join("lib");
        fs::create_dir_all(lib.join("adafruit_bus_device")).unwrap();
        fs::write(lib.join("neopixel.py"), b"").unwrap();
        let manifest = temp.path().join("manifest.json");
        write_manifest(&manifest);

        assert_eq!(build_catalog(&lib, &manifest), build_catalog(&lib, &manifest));
    }

    #[test]
    fn test_bad_manifest_yields_empty_catalog() {
        let temp = TempDir::new().unwrap();
        let lib = temp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("neopixel.py"), b"").unwrap();

        assert!(build_catalog(&lib, &temp.path().join("missing.json")).is_empty());

        let corrupt = temp.path().join("corrupt.json");
        fs::write(&corrupt, "not json").unwrap();
        assert!(build_catalog(&lib, &corrupt).is_empty());
    }

    #[test]
    fn test_missing_root_yields_empty_catalog() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("manifest.json");
        write_manifest(&manifest);

        assert!(build_catalog(&temp.path().join("nope"), &manifest).is_empty());
    }
}
