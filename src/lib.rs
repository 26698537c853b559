// src/lib.rs

//! cpbundle: CircuitPython library bundle manager
//!
//! Downloads the tagged library bundle, caches it per release tag, verifies
//! it, and reconciles it against a project's `lib/` directory.
//!
//! # Architecture
//!
//! - `bundle`: release cache (fetch, extract, verify, current release)
//! - `catalog`: name to package mapping for a directory and a manifest
//! - `reconcile`: per-package Install / Update / UpToDate / Custom
//! - `install`: copy a bundle package into the project
//! - `workspace`: the project's package directory and installed versions
//! - `runtime`: which compiled variant the project's board needs

pub mod bundle;
pub mod catalog;
pub mod config;
mod error;
pub mod install;
pub mod progress;
pub mod prompt;
pub mod reconcile;
pub mod runtime;
pub mod settings;
pub mod workspace;

pub use bundle::{ArchiveStore, BundleRelease, BundleSession, ReleaseHost, UpdateOutcome};
pub use catalog::{Catalog, Package, build_catalog};
pub use config::BundleConfig;
pub use error::{Error, Result};
pub use install::{BatchReport, InstallExecutor};
pub use prompt::SelectionPrompt;
pub use reconcile::{Action, Entry, present_all, present_installed, present_updates};
pub use runtime::RuntimeTarget;
pub use settings::{FileSettings, SettingsStore};
pub use workspace::Workspace;
