// src/reconcile.rs

//! Bundle versus project reconciliation
//!
//! Compares the bundle catalog with the project's catalog and classifies
//! every package name. Classification is a pure function of the two sides,
//! so the presentation layer only has to render the entries.

use crate::catalog::{Catalog, Package};
use std::fmt;

/// What can be done with a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// In the bundle, not in the project
    Install,
    /// In both, versions differ
    Update,
    /// In both, versions equal
    UpToDate,
    /// In the project only; not managed
    Custom,
}

impl Action {
    /// True when selecting the entry leads to a copy from the bundle
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Install | Self::Update)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Install => write!(f, "install"),
            Action::Update => write!(f, "update"),
            Action::UpToDate => write!(f, "up-to-date"),
            Action::Custom => write!(f, "custom"),
        }
    }
}

/// Classify one package name; `None` when it is on neither side
pub fn classify(bundle: Option<&Package>, workspace: Option<&Package>) -> Option<Action> {
    match (bundle, workspace) {
        (None, None) => None,
        (None, Some(_)) => Some(Action::Custom),
        (Some(_), None) => Some(Action::Install),
        (Some(b), Some(w)) if b.version == w.version => Some(Action::UpToDate),
        (Some(_), Some(_)) => Some(Action::Update),
    }
}

/// One row of the reconciliation view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub action: Action,
    pub bundle: Option<Package>,
    pub workspace: Option<Package>,
}

impl Entry {
    fn new(name: &str, bundle: Option<&Package>, workspace: Option<&Package>) -> Option<Self> {
        let action = classify(bundle, workspace)?;
        Some(Self {
            name: name.to_string(),
            action,
            bundle: bundle.cloned(),
            workspace: workspace.cloned(),
        })
    }

    pub fn bundle_version(&self) -> Option<&str> {
        self.bundle.as_ref().map(|p| p.version.as_str())
    }

    pub fn installed_version(&self) -> Option<&str> {
        self.workspace.as_ref().map(|p| p.version.as_str())
    }

    /// One-line label for selection prompts and listings
    pub fn label(&self) -> String {
        match (self.installed_version(), self.bundle_version()) {
            (Some(installed), Some(available)) if self.action == Action::Update => {
                format!("{} {} -> {} [{}]", self.name, installed, available, self.action)
            }
            (Some(installed), _) => format!("{} {} [{}]", self.name, installed, self.action),
            (None, Some(available)) => format!("{} {} [{}]", self.name, available, self.action),
            (None, None) => format!("{} [{}]", self.name, self.action),
        }
    }
}

/// Installed packages first, then uninstalled bundle packages, each sorted by name
pub fn present_all(bundle: &Catalog, workspace: &Catalog) -> Vec<Entry> {
    let mut entries = present_installed(bundle, workspace);
    entries.extend(
        bundle
            .iter()
            .filter(|(name, _)| !workspace.contains_key(*name))
            .filter_map(|(name, pkg)| Entry::new(name, Some(pkg), None)),
    );
    entries
}

/// Installed packages only, sorted by name
pub fn present_installed(bundle: &Catalog, workspace: &Catalog) -> Vec<Entry> {
    workspace
        .iter()
        .filter_map(|(name, pkg)| Entry::new(name, bundle.get(name), Some(pkg)))
        .collect()
}

/// Installed packages whose bundle version differs
pub fn present_updates(bundle: &Catalog, workspace: &Catalog) -> Vec<Entry> {
    present_installed(bundle, workspace)
        .into_iter()
        .filter(|e| e.action == Action::Update)
        .collect()
}
