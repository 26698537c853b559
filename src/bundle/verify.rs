// src/bundle/verify.rs

//! Structural verification of a cached release
//!
//! A tag is trusted only when every configured variant was extracted, every
//! variant directory holds exactly one non-empty package root, and the
//! manifest parses. Verification is read-only; promotion and cleanup belong
//! to the session.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use super::store::ArchiveStore;
use super::{BundleRelease, PACKAGE_ROOT};

/// Checks cached tags before they are used
#[derive(Debug, Clone)]
pub struct BundleVerifier {
    store: ArchiveStore,
    bundle_name: String,
    suffixes: Vec<String>,
}

impl BundleVerifier {
    pub fn new(store: ArchiveStore, bundle_name: &str, suffixes: Vec<String>) -> Self {
        Self {
            store,
            bundle_name: bundle_name.to_string(),
            suffixes,
        }
    }

    /// True if `tag` is structurally complete
    pub fn verify(&self, tag: &str) -> bool {
        match self.check(tag) {
            Ok(_) => {
                info!("Bundle {} verified", tag);
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Verify `tag`, returning the release or the first problem found
    pub fn check(&self, tag: &str) -> Result<BundleRelease> {
        let dir = self.store.tag_dir(tag);
        let release = BundleRelease::new(tag, dir.clone(), &self.bundle_name);

        if !dir.is_dir() {
            return Err(fail(tag, "tag directory does not exist"));
        }

        for suffix in &self.suffixes {
            if !release.variant_dir(suffix).is_dir() {
                return Err(fail(tag, &format!("variant {suffix} is missing")));
            }
        }

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() || is_hidden(&entry.path()) {
                continue;
            }
            check_variant(tag, &entry.path())?;
        }

        let manifest = release.manifest_path();
        let content = fs::read_to_string(&manifest)
            .map_err(|e| fail(tag, &format!("manifest {} unreadable: {e}", manifest.display())))?;
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(serde_json::Value::Object(_)) => {}
            Ok(_) => return Err(fail(tag, "manifest is not a JSON object")),
            Err(e) => return Err(fail(tag, &format!("manifest does not parse: {e}"))),
        }

        Ok(release)
    }
}

/// A variant must contain exactly one package root, and it must not be empty
fn check_variant(tag: &str, variant: &Path) -> Result<()> {
    let mut roots = Vec::new();
    for entry in fs::read_dir(variant)? {
        let entry = entry?;
        let name = entry.file_name();
        if entry.file_type()?.is_dir()
            && name.to_str().is_some_and(|n| n.eq_ignore_ascii_case(PACKAGE_ROOT))
        {
            roots.push(entry.path());
        }
    }

    let variant_name = variant.file_name().unwrap_or_default().to_string_lossy();
    match roots.as_slice() {
        [root] => {
            let packages = fs::read_dir(root)?
                .filter_map(|e| e.ok())
                .filter(|e| !is_hidden(&e.path()))
                .count();
            if packages == 0 {
                return Err(fail(tag, &format!("{variant_name} has an empty package root")));
            }
            debug!("{} has {} packages", variant_name, packages);
            Ok(())
        }
        [] => Err(fail(tag, &format!("{variant_name} has no package root"))),
        _ => Err(fail(
            tag,
            &format!("{variant_name} has {} package roots", roots.len()),
        )),
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn fail(tag: &str, reason: &str) -> Error {
    Error::Verification(format!("{tag}: {reason}"))
}
