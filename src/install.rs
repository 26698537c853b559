// src/install.rs

//! Copying bundle packages into a project
//!
//! Install and update are the same operation: the package is copied over
//! whatever is at the destination. Single-file packages always land with
//! the extension of the active runtime target, so a project never mixes
//! `.py` and `.mpy` copies of bundle modules.

use crate::bundle::BundleRelease;
use crate::catalog::{Package, package_name};
use crate::error::{Error, Result};
use crate::runtime::{BINARY_EXT, RuntimeTarget, SOURCE_EXT};
use crate::workspace::Workspace;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File name a single-file package is installed under
pub fn installed_file_name(file_name: &str, target: &RuntimeTarget) -> String {
    format!("{}.{}", package_name(file_name), target.file_ext())
}

/// Result of applying several packages
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    pub installed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copies packages from the current release's active variant
#[derive(Debug, Clone)]
pub struct InstallExecutor {
    release: BundleRelease,
    target: RuntimeTarget,
}

impl InstallExecutor {
    pub fn new(release: BundleRelease, target: RuntimeTarget) -> Self {
        Self { release, target }
    }

    pub fn target(&self) -> &RuntimeTarget {
        &self.target
    }

    /// Where to copy a bundle package from
    ///
    /// Single files are looked up in the active variant under the target
    /// extension; if no such file exists the package's own location is used.
    pub fn source_path(&self, pkg: &Package) -> PathBuf {
        let lib = self.release.lib_dir(&self.target.suffix);
        let candidate = if pkg.is_directory {
            lib.join(&pkg.name)
        } else {
            let file_name = pkg.file_name().unwrap_or(&pkg.name);
            lib.join(installed_file_name(file_name, &self.target))
        };

        if candidate.exists() {
            candidate
        } else {
            debug!(
                "{} not found, installing from {}",
                candidate.display(),
                pkg.location.display()
            );
            pkg.location.clone()
        }
    }

    /// Install or update one package, then reload the project catalog
    pub fn apply(&self, pkg: &Package, workspace: &mut Workspace) -> Result<PathBuf> {
        let source = self.source_path(pkg);
        let install_err = |e: std::io::Error| Error::Install(format!("{}: {e}", pkg.name));

        let dest = if source.is_dir() {
            let dest = workspace.lib_dir().join(&pkg.name);
            copy_dir(&source, &dest).map_err(install_err)?;
            dest
        } else {
            let file_name = source
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&pkg.name);
            let dest = workspace
                .lib_dir()
                .join(installed_file_name(file_name, &self.target));
            remove_other_variant(&dest, &self.target).map_err(install_err)?;
            fs::copy(&source, &dest).map_err(install_err)?;
            dest
        };

        workspace
            .record_install(&pkg.name, &pkg.version)
            .map_err(|e| Error::Install(format!("{}: recording version failed: {e}", pkg.name)))?;
        workspace.reload();

        info!("Installed {} {} to {}", pkg.name, pkg.version, dest.display());
        Ok(dest)
    }

    /// Apply packages one after another; a failure does not stop the batch
    pub fn apply_all<'a>(
        &self,
        packages: impl IntoIterator<Item = &'a Package>,
        workspace: &mut Workspace,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for pkg in packages {
            match self.apply(pkg, workspace) {
                Ok(_) => report.installed.push(pkg.name.clone()),
                Err(e) => {
                    warn!("{}", e);
                    report.failed.push((pkg.name.clone(), e.to_string()));
                }
            }
        }
        report
    }
}

/// Remove a copy of the same module left by a different runtime variant
fn remove_other_variant(dest: &Path, target: &RuntimeTarget) -> std::io::Result<()> {
    for ext in [SOURCE_EXT, BINARY_EXT] {
        if ext == target.file_ext() {
            continue;
        }
        let stale = dest.with_extension(ext);
        if stale.is_file() {
            debug!("Removing {} left by another variant", stale.display());
            fs::remove_file(&stale)?;
        }
    }
    Ok(())
}

/// Recursively copy `src` into `dest`, overwriting files that exist
fn copy_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
