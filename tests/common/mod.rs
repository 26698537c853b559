// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use cpbundle::bundle::{variant_dir_name, ArchiveStore};
use cpbundle::{BundleConfig, BundleSession, ReleaseHost, Result};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;

pub const BUNDLE_NAME: &str = "adafruit-circuitpython-bundle";

pub const TAG_OLD: &str = "20240101";
pub const TAG_NEW: &str = "20240201";

/// Config pointing at a temp cache, without progress bars
pub fn test_config(cache_root: &Path) -> BundleConfig {
    BundleConfig {
        bundle_name: BUNDLE_NAME.to_string(),
        suffixes: vec!["py".to_string(), "9.x-mpy".to_string()],
        cache_root: Some(cache_root.to_path_buf()),
        progress: false,
        ..Default::default()
    }
}

/// Session wired to a mock host
pub fn test_session(config: &BundleConfig, host: Arc<MockHost>) -> BundleSession {
    let store = ArchiveStore::with_dir_trash(&config.cache_root());
    BundleSession::new(config, host, store)
}

/// One package in a mock release
#[derive(Debug, Clone)]
pub struct MockPackage {
    pub name: String,
    pub version: String,
    pub is_directory: bool,
}

impl MockPackage {
    pub fn file(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            is_directory: false,
        }
    }

    pub fn dir(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            is_directory: true,
        }
    }
}

/// In-memory release host
///
/// Archives are built on demand from the registered packages. Individual
/// (tag, suffix) pairs can be made to fail.
#[derive(Default)]
pub struct MockHost {
    latest: Mutex<Option<String>>,
    releases: Mutex<BTreeMap<String, Vec<MockPackage>>>,
    failing: Mutex<HashSet<(String, String)>>,
    failing_manifests: Mutex<HashSet<String>>,
    archive_requests: AtomicUsize,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a release and make it the latest
    pub fn publish(&self, tag: &str, packages: Vec<MockPackage>) {
        self.releases
            .lock()
            .unwrap()
            .insert(tag.to_string(), packages);
        *self.latest.lock().unwrap() = Some(tag.to_string());
    }

    /// Make one suffix archive of a tag unavailable
    pub fn fail_suffix(&self, tag: &str, suffix: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert((tag.to_string(), suffix.to_string()));
    }

    /// Make the manifest of a tag unavailable
    pub fn fail_manifest(&self, tag: &str) {
        self.failing_manifests
            .lock()
            .unwrap()
            .insert(tag.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
        self.failing_manifests.lock().unwrap().clear();
    }

    pub fn archive_requests(&self) -> usize {
        self.archive_requests.load(Ordering::SeqCst)
    }

    fn packages(&self, tag: &str) -> Result<Vec<MockPackage>> {
        self.releases
            .lock()
            .unwrap()
            .get(tag)
            .cloned()
            .ok_or_else(|| cpbundle::Error::Network(format!("HTTP 404 for {tag}")))
    }
}

/// Zip of one variant, laid out as `<name>-<suffix>-<tag>/lib/...`
pub fn build_archive(tag: &str, suffix: &str, packages: &[MockPackage]) -> Vec<u8> {
    let ext = if suffix == "py" { "py" } else { "mpy" };
    let root = format!("{}/lib", variant_dir_name(BUNDLE_NAME, suffix, tag));

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for pkg in packages {
        let (path, body) = if pkg.is_directory {
            (
                format!("{root}/{}/__init__.{ext}", pkg.name),
                format!("# {} {} package\n", pkg.name, pkg.version),
            )
        } else {
            (
                format!("{root}/{}.{ext}", pkg.name),
                format!("# {} {}\n", pkg.name, pkg.version),
            )
        };
        zip.start_file(path, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Manifest JSON mapping package name to version
pub fn build_manifest(packages: &[MockPackage]) -> Vec<u8> {
    let manifest: serde_json::Map<String, serde_json::Value> = packages
        .iter()
        .map(|p| {
            (
                p.name.clone(),
                serde_json::json!({ "version": p.version, "package": p.is_directory }),
            )
        })
        .collect();
    serde_json::to_vec_pretty(&manifest).unwrap()
}

impl ReleaseHost for MockHost {
    fn latest_tag(&self) -> Result<String> {
        self.latest
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| cpbundle::Error::Resolution("no releases published".to_string()))
    }

    fn fetch_archive(
        &self,
        tag: &str,
        suffix: &str,
        out: &mut dyn Write,
        _progress: Option<&ProgressBar>,
    ) -> Result<u64> {
        self.archive_requests.fetch_add(1, Ordering::SeqCst);
        if self
            .failing
            .lock()
            .unwrap()
            .contains(&(tag.to_string(), suffix.to_string()))
        {
            return Err(cpbundle::Error::Network(format!(
                "connection reset fetching {suffix}"
            )));
        }

        let bytes = build_archive(tag, suffix, &self.packages(tag)?);
        out.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }

    fn fetch_manifest(&self, tag: &str) -> Result<Vec<u8>> {
        if self.failing_manifests.lock().unwrap().contains(tag) {
            return Err(cpbundle::Error::Network(format!(
                "HTTP 503 fetching manifest of {tag}"
            )));
        }
        Ok(build_manifest(&self.packages(tag)?))
    }
}

/// Write a `boot_out.txt` declaring a runtime version
pub fn write_marker(project: &Path, version: &str) {
    std::fs::write(
        project.join("boot_out.txt"),
        format!("Adafruit CircuitPython {version} on 2024-01-01; Raspberry Pi Pico with rp2040\n"),
    )
    .unwrap();
}
