// src/prompt.rs

//! User selection
//!
//! The host presents labelled choices and returns one index or nothing.
//! Turning a selection into work is a separate, pure step so the
//! reconciliation view stays independent of any UI.

use crate::catalog::Package;
use crate::reconcile::{Action, Entry};

/// Presents a list of labelled choices
pub trait SelectionPrompt {
    /// Index of the chosen label, `None` if the user cancelled
    fn select(&mut self, title: &str, labels: &[String]) -> Option<usize>;
}

/// Bundle package to apply for an entry, if its action copies anything
///
/// Up-to-date and custom entries never produce work.
pub fn planned_package(entry: &Entry) -> Option<&Package> {
    match entry.action {
        Action::Install | Action::Update => entry.bundle.as_ref(),
        Action::UpToDate | Action::Custom => None,
    }
}

/// Ask the prompt to pick one of `entries`
pub fn select_entry<'a>(
    prompt: &mut dyn SelectionPrompt,
    title: &str,
    entries: &'a [Entry],
) -> Option<&'a Entry> {
    if entries.is_empty() {
        return None;
    }
    let labels: Vec<String> = entries.iter().map(Entry::label).collect();
    prompt.select(title, &labels).and_then(|i| entries.get(i))
}
