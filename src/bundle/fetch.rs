// src/bundle/fetch.rs

//! Downloading a tagged release into the cache
//!
//! Every configured suffix is downloaded and extracted on the rayon pool
//! while the manifest is fetched alongside. A suffix that fails is logged
//! and recorded; it never aborts its siblings. `fetch_release` only returns
//! once every suffix has settled, so verification never sees a download in
//! flight.

use crate::error::{Error, Result};
use crate::progress::DownloadProgress;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::client::ReleaseHost;
use super::extract::extract_zip;
use super::store::ArchiveStore;
use super::{BundleRelease, is_tag};

/// Outcome of fetching one tag
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub release: BundleRelease,
    /// Suffixes extracted, with the number of files written
    pub extracted: Vec<(String, usize)>,
    /// Suffixes that failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves and downloads bundle releases
pub struct BundleFetcher {
    host: Arc<dyn ReleaseHost>,
    store: ArchiveStore,
    bundle_name: String,
    suffixes: Vec<String>,
    show_progress: bool,
}

impl BundleFetcher {
    pub fn new(
        host: Arc<dyn ReleaseHost>,
        store: ArchiveStore,
        bundle_name: &str,
        suffixes: Vec<String>,
    ) -> Self {
        Self {
            host,
            store,
            bundle_name: bundle_name.to_string(),
            suffixes,
            show_progress: false,
        }
    }

    /// Draw progress bars while downloading
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Most recent release tag on the host
    pub fn latest_tag(&self) -> Result<String> {
        self.host.latest_tag()
    }

    /// Download and extract every suffix of `tag`, plus its manifest
    ///
    /// Fails only when the tag is malformed, the tag directory cannot be
    /// created, or the manifest cannot be stored. Per-suffix failures are
    /// reported in the returned [`FetchReport`].
    pub fn fetch_release(&self, tag: &str) -> Result<FetchReport> {
        if !is_tag(tag) {
            return Err(Error::Resolution(format!("not a release tag: {tag:?}")));
        }

        let tag_dir = self.store.root_dir()?.join(tag);
        fs::create_dir_all(&tag_dir)?;
        let release = BundleRelease::new(tag, tag_dir.clone(), &self.bundle_name);

        info!(
            "Fetching bundle {} ({} variants) into {}",
            tag,
            self.suffixes.len(),
            tag_dir.display()
        );

        let progress = if self.show_progress {
            DownloadProgress::new()
        } else {
            DownloadProgress::hidden()
        };
        let bars: Vec<ProgressBar> = self
            .suffixes
            .iter()
            .map(|s| progress.add_download(s))
            .collect();

        let (manifest, results): (Result<PathBuf>, Vec<(String, Result<usize>)>) = rayon::join(
            || self.fetch_manifest(&release),
            || {
                self.suffixes
                    .par_iter()
                    .zip(bars.par_iter())
                    .map(|(suffix, pb)| {
                        let result = self.fetch_suffix(tag, suffix, &tag_dir, pb);
                        match &result {
                            Ok(_) => DownloadProgress::finish_download(pb, suffix),
                            Err(_) => DownloadProgress::fail_download(pb, suffix),
                        }
                        (suffix.clone(), result)
                    })
                    .collect()
            },
        );

        let mut extracted = Vec::new();
        let mut failed = Vec::new();
        for (suffix, result) in results {
            match result {
                Ok(count) => extracted.push((suffix, count)),
                Err(e) => {
                    warn!("Bundle variant {} of {} failed: {}", suffix, tag, e);
                    failed.push((suffix, e.to_string()));
                }
            }
        }

        let manifest_path = manifest?;
        info!(
            "Fetched bundle {}: {} variants extracted, {} failed, manifest at {}",
            tag,
            extracted.len(),
            failed.len(),
            manifest_path.display()
        );

        Ok(FetchReport {
            release,
            extracted,
            failed,
        })
    }

    /// Stream one suffix archive to a temp file in the tag dir, then extract it there
    fn fetch_suffix(
        &self,
        tag: &str,
        suffix: &str,
        tag_dir: &Path,
        pb: &ProgressBar,
    ) -> Result<usize> {
        let mut temp = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".zip")
            .tempfile_in(tag_dir)?;

        self.host
            .fetch_archive(tag, suffix, temp.as_file_mut(), Some(pb))?;
        temp.as_file_mut().flush()?;

        let count = extract_zip(temp.path(), tag_dir)?;
        info!("Extracted {} files for {} {}", count, tag, suffix);
        Ok(count)
    }

    /// Download the manifest once and store it verbatim
    fn fetch_manifest(&self, release: &BundleRelease) -> Result<PathBuf> {
        let bytes = self.host.fetch_manifest(&release.tag)?;
        let path = release.manifest_path();

        let mut temp = tempfile::Builder::new()
            .prefix(".manifest-")
            .tempfile_in(&release.dir)?;
        temp.write_all(&bytes)?;
        temp.persist(&path)
            .map_err(|e| Error::Io(e.error))?;

        Ok(path)
    }
}
