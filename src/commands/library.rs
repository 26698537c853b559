// src/commands/library.rs
//! Library reconciliation and install commands

use super::Context;
use anyhow::{Result, bail};
use cpbundle::prompt::{planned_package, select_entry};
use cpbundle::{
    Action, BatchReport, Entry, SelectionPrompt, present_all, present_installed, present_updates,
};
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use std::path::Path;
use tracing::warn;

/// Terminal selection prompt
struct TerminalPrompt;

impl SelectionPrompt for TerminalPrompt {
    fn select(&mut self, title: &str, labels: &[String]) -> Option<usize> {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(title)
            .items(labels)
            .default(0)
            .interact_opt()
            .unwrap_or_else(|e| {
                warn!("Selection prompt failed: {}", e);
                None
            })
    }
}

fn print_entries(entries: &[Entry]) {
    if entries.is_empty() {
        println!("Nothing to show");
        return;
    }

    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    println!(
        "  {:<width$}  {:<12}  {:<12}  STATUS",
        "NAME", "INSTALLED", "BUNDLE"
    );
    for entry in entries {
        println!(
            "  {:<width$}  {:<12}  {:<12}  {}",
            entry.name,
            entry.installed_version().unwrap_or("-"),
            entry.bundle_version().unwrap_or("-"),
            entry.action
        );
    }
}

fn print_batch(report: &BatchReport) {
    for name in &report.installed {
        println!("  installed {}", name);
    }
    for (name, reason) in &report.failed {
        println!("  FAILED {}: {}", name, reason);
    }
}

/// Reconcile the bundle against the project
pub fn cmd_list(
    project: &Path,
    config_path: Option<&Path>,
    installed: bool,
    updates: bool,
) -> Result<()> {
    let ctx = Context::open(project, config_path)?;
    let bundle = ctx.session.bundle_catalog(&ctx.target.suffix)?;
    let workspace = ctx.workspace.catalog();

    let entries = if updates {
        present_updates(&bundle, workspace)
    } else if installed {
        present_installed(&bundle, workspace)
    } else {
        present_all(&bundle, workspace)
    };

    println!(
        "Bundle {} ({}), project {}",
        ctx.release()?.tag,
        ctx.target.suffix,
        ctx.workspace.root().display()
    );
    print_entries(&entries);
    Ok(())
}

/// Install or update the named libraries
pub fn cmd_install(project: &Path, config_path: Option<&Path>, names: &[String]) -> Result<()> {
    let mut ctx = Context::open(project, config_path)?;
    let bundle = ctx.session.bundle_catalog(&ctx.target.suffix)?;
    let installer = ctx.session.installer(ctx.target.clone())?;

    let mut missing = Vec::new();
    let mut packages = Vec::new();
    for name in names {
        match bundle.get(name) {
            Some(pkg) => packages.push(pkg),
            None => missing.push(name.as_str()),
        }
    }
    for name in &missing {
        println!("  not in bundle: {}", name);
    }

    let report = installer.apply_all(packages, &mut ctx.workspace);
    print_batch(&report);

    if !missing.is_empty() || !report.is_success() {
        bail!(
            "{} of {} libraries could not be installed",
            missing.len() + report.failed.len(),
            names.len()
        );
    }
    Ok(())
}

/// Pick one library and apply its action
pub fn cmd_select(project: &Path, config_path: Option<&Path>, installed: bool) -> Result<()> {
    let mut ctx = Context::open(project, config_path)?;
    let bundle = ctx.session.bundle_catalog(&ctx.target.suffix)?;
    let entries = if installed {
        present_installed(&bundle, ctx.workspace.catalog())
    } else {
        present_all(&bundle, ctx.workspace.catalog())
    };

    let Some(entry) = select_entry(&mut TerminalPrompt, "Select a library", &entries) else {
        println!("Nothing selected");
        return Ok(());
    };

    let Some(pkg) = planned_package(entry) else {
        match entry.action {
            Action::Custom => println!("{} is not managed by the bundle", entry.name),
            _ => println!("{} is up to date", entry.name),
        }
        return Ok(());
    };

    let installer = ctx.session.installer(ctx.target.clone())?;
    let dest = installer.apply(pkg, &mut ctx.workspace)?;
    println!("{} {} -> {}", entry.action, entry.name, dest.display());
    Ok(())
}

/// Update every installed library whose bundle version differs
pub fn cmd_upgrade(project: &Path, config_path: Option<&Path>) -> Result<()> {
    let mut ctx = Context::open(project, config_path)?;
    let bundle = ctx.session.bundle_catalog(&ctx.target.suffix)?;
    let updates = present_updates(&bundle, ctx.workspace.catalog());

    if updates.is_empty() {
        println!("All libraries are up to date");
        return Ok(());
    }

    println!("Updating {} libraries", updates.len());
    let installer = ctx.session.installer(ctx.target.clone())?;
    let report = installer.apply_all(updates.iter().filter_map(planned_package), &mut ctx.workspace);
    print_batch(&report);

    if !report.is_success() {
        bail!("{} of {} updates failed", report.failed.len(), updates.len());
    }
    Ok(())
}
