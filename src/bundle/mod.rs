// src/bundle/mod.rs

//! Bundle release cache
//!
//! This module provides functionality for:
//! - Resolving the latest bundle release tag
//! - Downloading and extracting every suffix variant of a tag
//! - Verifying that a cached tag is structurally complete
//! - Tracking the current verified release and retiring stale ones
//!
//! # Cache layout
//!
//! ```text
//! <cache-root>/bundle/<tag>/<bundle-name>-<tag>.json
//! <cache-root>/bundle/<tag>/<bundle-name>-<suffix>-<tag>/lib/<package>
//! ```

mod client;
mod extract;
mod fetch;
mod session;
mod store;
mod verify;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub use client::{HttpReleaseHost, ReleaseHost};
pub use extract::extract_zip;
pub use fetch::{BundleFetcher, FetchReport};
pub use session::{BundleSession, UpdateOutcome};
pub use store::{ArchiveStore, CacheLock, DirTrash, Trash};
pub use verify::BundleVerifier;

/// Name of the package root directory inside every variant
pub const PACKAGE_ROOT: &str = "lib";

static TAG_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\d{8}$").unwrap());

/// Check whether a string looks like a bundle release tag (`YYYYMMDD`)
pub fn is_tag(s: &str) -> bool {
    TAG_RE.is_match(s)
}

/// Directory name of one suffix variant of a tag
pub fn variant_dir_name(bundle_name: &str, suffix: &str, tag: &str) -> String {
    format!("{bundle_name}-{suffix}-{tag}")
}

/// File name of a tag's manifest
pub fn manifest_file_name(bundle_name: &str, tag: &str) -> String {
    format!("{bundle_name}-{tag}.json")
}

/// One cached, tagged bundle snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRelease {
    pub tag: String,
    /// `<cache-root>/bundle/<tag>`
    pub dir: PathBuf,
    pub bundle_name: String,
}

impl BundleRelease {
    pub fn new(tag: &str, dir: PathBuf, bundle_name: &str) -> Self {
        Self {
            tag: tag.to_string(),
            dir,
            bundle_name: bundle_name.to_string(),
        }
    }

    /// Manifest shared by all variants
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(manifest_file_name(&self.bundle_name, &self.tag))
    }

    /// Directory of one suffix variant
    pub fn variant_dir(&self, suffix: &str) -> PathBuf {
        self.dir
            .join(variant_dir_name(&self.bundle_name, suffix, &self.tag))
    }

    /// Package root of one suffix variant
    pub fn lib_dir(&self, suffix: &str) -> PathBuf {
        self.variant_dir(suffix).join(PACKAGE_ROOT)
    }

    /// Suffix of a variant directory name, if it belongs to this release
    pub fn suffix_of(&self, variant: &Path) -> Option<String> {
        let name = variant.file_name()?.to_str()?;
        let prefix = format!("{}-", self.bundle_name);
        let tail = format!("-{}", self.tag);
        name.strip_prefix(&prefix)?
            .strip_suffix(&tail)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
