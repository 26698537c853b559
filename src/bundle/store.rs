// src/bundle/store.rs

//! On-disk bundle cache
//!
//! The cache root holds one directory per release tag. Writers (a fetch, or
//! the sweep that retires stale tags) hold [`CacheLock`], an exclusive file
//! lock on `<cache-root>/bundle/.lock`, so separate processes sharing the
//! cache never write to it at the same time.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::is_tag;

/// Lock file inside the cache root
pub const LOCK_FILE: &str = ".lock";

/// Exclusive hold on the bundle cache
///
/// Released when dropped (the lock goes with the file handle).
#[derive(Debug)]
pub struct CacheLock {
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl CacheLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        debug!("Released cache lock at {}", self.path.display());
    }
}

/// Facility that takes a directory out of the way without deleting it outright
pub trait Trash: Send + Sync {
    fn trash(&self, path: &Path) -> Result<()>;
}

/// Moves trashed directories into a `.trash` directory beside the cache
///
/// Falls back to removing the directory when a rename is not possible
/// (cross-device cache roots).
#[derive(Debug, Clone)]
pub struct DirTrash {
    dir: PathBuf,
}

impl DirTrash {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Trash for DirTrash {
    fn trash(&self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Io(std::io::Error::other(format!("cannot trash {}", path.display()))))?;

        fs::create_dir_all(&self.dir)?;
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let target = self.dir.join(format!("{name}-{stamp}"));

        match fs::rename(path, &target) {
            Ok(()) => {
                debug!("Moved {} to {}", path.display(), target.display());
                Ok(())
            }
            Err(e) => {
                debug!("Rename to trash failed ({}), removing {}", e, path.display());
                fs::remove_dir_all(path)?;
                Ok(())
            }
        }
    }
}

/// Filesystem primitives for the tagged bundle cache
#[derive(Clone)]
pub struct ArchiveStore {
    /// `<cache-root>/bundle`
    root: PathBuf,
    trash: Arc<dyn Trash>,
}

impl std::fmt::Debug for ArchiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStore").field("root", &self.root).finish()
    }
}

impl ArchiveStore {
    /// Create a store under `cache_root` with an explicit trash facility
    pub fn new(cache_root: &Path, trash: Arc<dyn Trash>) -> Self {
        Self {
            root: cache_root.join("bundle"),
            trash,
        }
    }

    /// Create a store whose retired tags go to `<cache_root>/.trash`
    pub fn with_dir_trash(cache_root: &Path) -> Self {
        Self::new(cache_root, Arc::new(DirTrash::new(cache_root.join(".trash"))))
    }

    /// Cache root, created if absent
    pub fn root_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.root)?;
        Ok(&self.root)
    }

    /// Directory for a tag (not created)
    pub fn tag_dir(&self, tag: &str) -> PathBuf {
        self.root.join(tag)
    }

    /// Cached tags, most recent first
    pub fn list_cached_tags(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut tags = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_tag(name) {
                    tags.push(name.to_string());
                }
            }
        }

        // Fixed-width numeric tags sort chronologically as strings
        tags.sort_unstable_by(|a, b| b.cmp(a));
        Ok(tags)
    }

    /// Try to take the cache lock without blocking
    ///
    /// `Ok(None)` when another session or process holds it.
    pub fn try_lock(&self) -> Result<Option<CacheLock>> {
        let path = self.root_dir()?.join(LOCK_FILE);
        let file = File::create(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired cache lock at {}", path.display());
                Ok(Some(CacheLock { file, path }))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                debug!("Cache lock already held at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Move a tag directory to trash on a background thread
    ///
    /// Failures are logged and swallowed. The returned handle may be joined
    /// but never has to be.
    pub fn retire(&self, tag: &str) -> JoinHandle<()> {
        let dir = self.tag_dir(tag);
        let trash = Arc::clone(&self.trash);
        let tag = tag.to_string();

        thread::spawn(move || retire_dir(trash.as_ref(), &dir, &tag))
    }

    /// Retire every cached tag except `current` on a background thread
    ///
    /// The thread owns `lock` until the sweep is done, so no other writer
    /// can start a fetch into a tag that is about to be moved away.
    pub fn sweep(&self, current: &str, lock: CacheLock) -> JoinHandle<()> {
        let store = self.clone();
        let current = current.to_string();

        thread::spawn(move || {
            let tags = match store.list_cached_tags() {
                Ok(tags) => tags,
                Err(e) => {
                    warn!("Could not list cached bundles for cleanup: {}", e);
                    return;
                }
            };
            for tag in tags.iter().filter(|t| **t != current) {
                retire_dir(store.trash.as_ref(), &store.tag_dir(tag), tag);
            }
            drop(lock);
        })
    }
}

fn retire_dir(trash: &dyn Trash, dir: &Path, tag: &str) {
    if !dir.exists() {
        return;
    }
    match trash.trash(dir) {
        Ok(()) => info!("Retired cached bundle {}", tag),
        Err(e) => warn!("Failed to retire cached bundle {}: {}", tag, e),
    }
}
