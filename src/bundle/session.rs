// src/bundle/session.rs

//! Bundle session
//!
//! The session owns the current verified release and everything needed to
//! replace it. Only one update may run at a time: a second caller in the
//! same session, or any session holding the cache lock in another process,
//! is turned away with [`Error::Busy`] instead of racing it.

use crate::catalog::{Catalog, build_catalog};
use crate::config::BundleConfig;
use crate::error::{Error, Result};
use crate::install::InstallExecutor;
use crate::runtime::RuntimeTarget;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use super::client::{HttpReleaseHost, ReleaseHost};
use super::fetch::{BundleFetcher, FetchReport};
use super::store::{ArchiveStore, CacheLock};
use super::verify::BundleVerifier;
use super::BundleRelease;

/// Result of a successful bundle update
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The latest tag is already the verified current release
    AlreadyCurrent(BundleRelease),
    /// A newer tag was fetched, verified and promoted
    Updated {
        release: BundleRelease,
        previous: Option<String>,
        report: FetchReport,
    },
}

impl UpdateOutcome {
    pub fn release(&self) -> &BundleRelease {
        match self {
            Self::AlreadyCurrent(release) => release,
            Self::Updated { release, .. } => release,
        }
    }
}

/// Clears the busy flag when an update finishes, however it finishes
struct UpdateGuard<'a>(&'a AtomicBool);

impl<'a> UpdateGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Bundle catalog cached for one (tag, suffix)
struct CachedCatalog {
    tag: String,
    suffix: String,
    catalog: Arc<Catalog>,
}

/// Owned context for the bundle cache
pub struct BundleSession {
    store: ArchiveStore,
    fetcher: BundleFetcher,
    verifier: BundleVerifier,
    current: RwLock<Option<BundleRelease>>,
    catalog: Mutex<Option<CachedCatalog>>,
    cleanup: Mutex<Vec<JoinHandle<()>>>,
    updating: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl BundleSession {
    /// Session against an explicit host and store
    pub fn new(config: &BundleConfig, host: Arc<dyn ReleaseHost>, store: ArchiveStore) -> Self {
        let fetcher = BundleFetcher::new(
            host,
            store.clone(),
            &config.bundle_name,
            config.suffixes.clone(),
        )
        .with_progress(config.progress);
        let verifier =
            BundleVerifier::new(store.clone(), &config.bundle_name, config.suffixes.clone());

        Self {
            store,
            fetcher,
            verifier,
            current: RwLock::new(None),
            catalog: Mutex::new(None),
            cleanup: Mutex::new(Vec::new()),
            updating: AtomicBool::new(false),
        }
    }

    /// Session against the configured HTTP host and cache root
    pub fn open(config: &BundleConfig) -> Result<Self> {
        let host = Arc::new(HttpReleaseHost::new(config)?);
        let store = ArchiveStore::with_dir_trash(&config.cache_root());
        store.root_dir()?;
        Ok(Self::new(config, host, store))
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    /// Current verified release, if any
    pub fn current(&self) -> Option<BundleRelease> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Adopt the newest cached tag that verifies
    ///
    /// Tags that fail verification are skipped (an interrupted fetch leaves
    /// a newer, incomplete tag behind). Stale tags are swept only when the
    /// cache lock is free; while another process is fetching they stay.
    pub fn load_cached(&self) -> Result<Option<BundleRelease>> {
        self.wait_for_cleanup();
        let cache_lock = self.store.try_lock()?;

        for tag in self.store.list_cached_tags()? {
            match self.verifier.check(&tag) {
                Ok(release) => {
                    self.promote(release.clone(), cache_lock);
                    return Ok(Some(release));
                }
                Err(e) => debug!("Skipping cached bundle: {}", e),
            }
        }
        info!("No verified bundle in cache");
        Ok(None)
    }

    /// Fetch the latest release if it differs from the current one
    pub fn update_bundle(&self) -> Result<UpdateOutcome> {
        let _guard = UpdateGuard::acquire(&self.updating)?;
        let cache_lock = self.lock_cache()?;
        let tag = self.fetcher.latest_tag()?;
        self.update_locked(&tag, cache_lock)
    }

    /// Fetch a specific tag and make it current
    pub fn update_to(&self, tag: &str) -> Result<UpdateOutcome> {
        let _guard = UpdateGuard::acquire(&self.updating)?;
        let cache_lock = self.lock_cache()?;
        self.update_locked(tag, cache_lock)
    }

    /// Take the cache lock for an update, after this session's own sweep
    fn lock_cache(&self) -> Result<CacheLock> {
        self.wait_for_cleanup();
        self.store.try_lock()?.ok_or(Error::Busy)
    }

    fn update_locked(&self, tag: &str, cache_lock: CacheLock) -> Result<UpdateOutcome> {
        let previous = self.current();
        if let Some(current) = &previous {
            if current.tag == tag && self.verifier.verify(tag) {
                info!("Bundle {} is already current", tag);
                return Ok(UpdateOutcome::AlreadyCurrent(current.clone()));
            }
        }

        let report = self.fetcher.fetch_release(tag)?;
        for (suffix, reason) in &report.failed {
            warn!("Variant {} was not fetched: {}", suffix, reason);
        }

        // An incomplete tag stays on disk until the next sweep; the previous
        // release stays current and the next update re-fetches over it.
        let release = self.verifier.check(tag)?;
        self.promote(release.clone(), Some(cache_lock));

        Ok(UpdateOutcome::Updated {
            release,
            previous: previous.map(|r| r.tag),
            report,
        })
    }

    /// Make `release` current and, holding the cache lock, sweep every other
    /// cached tag in the background
    fn promote(&self, release: BundleRelease, cache_lock: Option<CacheLock>) {
        info!("Bundle {} is now current", release.tag);
        match cache_lock {
            Some(cache_lock) => {
                let handle = self.store.sweep(&release.tag, cache_lock);
                lock(&self.cleanup).push(handle);
            }
            None => debug!("Cache is locked elsewhere, leaving stale bundles in place"),
        }
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(release);
        *lock(&self.catalog) = None;
    }

    /// Wait for background cleanup started by earlier promotions
    pub fn wait_for_cleanup(&self) {
        let handles: Vec<_> = lock(&self.cleanup).drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("Bundle cleanup worker panicked");
            }
        }
    }

    /// Catalog of the current release's `suffix` variant
    ///
    /// Built once per release and suffix; rebuilt only after a promotion.
    pub fn bundle_catalog(&self, suffix: &str) -> Result<Arc<Catalog>> {
        let release = self.current().ok_or(Error::NoRelease)?;

        let mut cached = lock(&self.catalog);
        if let Some(c) = cached.as_ref() {
            if c.tag == release.tag && c.suffix == suffix {
                return Ok(Arc::clone(&c.catalog));
            }
        }

        let catalog = Arc::new(build_catalog(
            &release.lib_dir(suffix),
            &release.manifest_path(),
        ));
        *cached = Some(CachedCatalog {
            tag: release.tag.clone(),
            suffix: suffix.to_string(),
            catalog: Arc::clone(&catalog),
        });
        Ok(catalog)
    }

    /// Installer bound to the current release and a runtime target
    pub fn installer(&self, target: RuntimeTarget) -> Result<InstallExecutor> {
        let release = self.current().ok_or(Error::NoRelease)?;
        Ok(InstallExecutor::new(release, target))
    }
}

impl Drop for BundleSession {
    fn drop(&mut self) {
        self.wait_for_cleanup();
    }
}
