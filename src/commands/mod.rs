// src/commands/mod.rs
//! Command handlers for the cpbundle CLI

mod bundle;
mod library;

pub use bundle::{cmd_fetch, cmd_runtime, cmd_tags};
pub use library::{cmd_install, cmd_list, cmd_select, cmd_upgrade};

use anyhow::{Context as _, Result};
use cpbundle::{
    BundleConfig, BundleRelease, BundleSession, FileSettings, RuntimeTarget, UpdateOutcome,
    Workspace, runtime,
};
use std::path::Path;
use tracing::info;

/// Everything a library command needs
pub struct Context {
    pub session: BundleSession,
    pub workspace: Workspace,
    pub target: RuntimeTarget,
}

impl Context {
    /// Open the project and make sure a verified release is current
    ///
    /// Uses the newest verified cached release; fetches one only when the
    /// cache has none.
    pub fn open(project: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = BundleConfig::load_or_default(config_path)?;
        let session = BundleSession::open(&config)?;

        if session.load_cached()?.is_none() {
            println!("No cached bundle, fetching the latest release...");
            let outcome = session
                .update_bundle()
                .context("Could not obtain a library bundle")?;
            report_update(&outcome);
        }

        let workspace = Workspace::open(project)
            .with_context(|| format!("Cannot open project {}", project.display()))?;
        let mut settings = FileSettings::for_project(workspace.root())?;
        let target = runtime::resolve(workspace.root(), &mut settings, &config.suffixes)?;
        info!(
            "Project {} uses bundle variant {}",
            workspace.root().display(),
            target.suffix
        );

        Ok(Self {
            session,
            workspace,
            target,
        })
    }

    /// Current release (always present after `open`)
    pub fn release(&self) -> Result<BundleRelease> {
        Ok(self.session.current().ok_or(cpbundle::Error::NoRelease)?)
    }
}

/// Print the single notification for a fetch/verify cycle
pub fn report_update(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::AlreadyCurrent(release) => {
            println!("Bundle {} is up to date", release.tag);
        }
        UpdateOutcome::Updated {
            release, previous, ..
        } => match previous {
            Some(prev) => println!("Bundle updated: {} -> {}", prev, release.tag),
            None => println!("Bundle {} downloaded and verified", release.tag),
        },
    }
}
