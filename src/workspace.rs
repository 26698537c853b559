// src/workspace.rs

//! Project package directory
//!
//! A project keeps its packages in `<project>/lib/`. Installed versions are
//! recorded in `lib/.bundle-lock.json`, which has the same shape as the
//! bundle manifest so the project catalog is built by the same code path.

use crate::catalog::{
    Catalog, Manifest, ManifestEntry, build_catalog, load_manifest, save_manifest,
};
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Project package directory name
pub const LIB_DIR: &str = "lib";

/// Installed-version record inside the package directory
pub const LOCK_FILE: &str = ".bundle-lock.json";

/// A project and its catalog of installed packages
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    lib_dir: PathBuf,
    catalog: Catalog,
}

impl Workspace {
    /// Open a project, creating `lib/` and an empty lock file if absent
    pub fn open(project_root: &Path) -> Result<Self> {
        let lib_dir = project_root.join(LIB_DIR);
        fs::create_dir_all(&lib_dir)?;
        let root = project_root.canonicalize()?;
        let lib_dir = root.join(LIB_DIR);

        let lock = lib_dir.join(LOCK_FILE);
        if !lock.exists() {
            save_manifest(&lock, &Manifest::new())?;
            debug!("Created {}", lock.display());
        }

        let mut workspace = Self {
            root,
            lib_dir,
            catalog: Catalog::new(),
        };
        workspace.reload();
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.lib_dir.join(LOCK_FILE)
    }

    /// Current project catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Rebuild the catalog from disk
    pub fn reload(&mut self) {
        self.catalog = build_catalog(&self.lib_dir, &self.manifest_path());
    }

    /// Record the installed version of a package
    pub fn record_install(&self, name: &str, version: &str) -> Result<()> {
        let path = self.manifest_path();
        let mut manifest = load_manifest(&path).unwrap_or_else(|e| {
            warn!("Rewriting unreadable lock file: {}", e);
            Manifest::new()
        });
        manifest.insert(name.to_string(), ManifestEntry::with_version(version));
        save_manifest(&path, &manifest)
    }
}
