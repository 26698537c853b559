// src/commands/bundle.rs
//! Bundle cache commands

use super::report_update;
use anyhow::Result;
use cpbundle::bundle::BundleVerifier;
use cpbundle::settings::RUNTIME_VERSION_KEY;
use cpbundle::{BundleConfig, BundleSession, FileSettings, SettingsStore, Workspace, runtime};
use std::path::Path;
use tracing::info;

/// Fetch the latest (or a given) release and make it current
pub fn cmd_fetch(config_path: Option<&Path>, tag: Option<&str>) -> Result<()> {
    let config = BundleConfig::load_or_default(config_path)?;
    let session = BundleSession::open(&config)?;
    session.load_cached()?;

    let result = match tag {
        Some(tag) => session.update_to(tag),
        None => session.update_bundle(),
    };

    match result {
        Ok(outcome) => {
            report_update(&outcome);
            if let cpbundle::UpdateOutcome::Updated { report, .. } = &outcome {
                for (suffix, reason) in &report.failed {
                    println!("  warning: variant {} failed: {}", suffix, reason);
                }
            }
            session.wait_for_cleanup();
            Ok(())
        }
        Err(e) => {
            if let Some(current) = session.current() {
                println!("Bundle update failed; still using {}", current.tag);
            }
            Err(e.into())
        }
    }
}

/// Show cached releases and which one verifies
pub fn cmd_tags(config_path: Option<&Path>) -> Result<()> {
    let config = BundleConfig::load_or_default(config_path)?;
    let session = BundleSession::open(&config)?;
    let verifier = BundleVerifier::new(
        session.store().clone(),
        &config.bundle_name,
        config.suffixes.clone(),
    );

    let tags = session.store().list_cached_tags()?;
    if tags.is_empty() {
        println!("No cached bundle releases");
        return Ok(());
    }

    println!("Cached bundle releases in {}:", session.store().root_dir()?.display());
    for tag in tags {
        let status = match verifier.check(&tag) {
            Ok(_) => "verified".to_string(),
            Err(e) => format!("incomplete ({e})"),
        };
        println!("  {}  {}", tag, status);
    }
    Ok(())
}

/// Show or set the project's runtime version
pub fn cmd_runtime(project: &Path, config_path: Option<&Path>, set: Option<&str>) -> Result<()> {
    let config = BundleConfig::load_or_default(config_path)?;
    let workspace = Workspace::open(project)?;
    let mut settings = FileSettings::for_project(workspace.root())?;

    if let Some(version) = set {
        info!("Setting runtime version to {}", version);
        settings.set(RUNTIME_VERSION_KEY, version)?;
    }

    let target = runtime::resolve(workspace.root(), &mut settings, &config.suffixes)?;
    println!(
        "Runtime version: {}",
        target.version.as_deref().unwrap_or("unknown")
    );
    println!("Bundle variant:  {}", target.suffix);
    println!("Module files:    .{}", target.file_ext());
    Ok(())
}
