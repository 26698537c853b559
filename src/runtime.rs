// src/runtime.rs

//! Target runtime detection and bundle suffix selection
//!
//! A CircuitPython board writes `boot_out.txt` at its root; the first line
//! looks like `Adafruit CircuitPython 9.2.1 on 2024-11-20; ...`. The third
//! token is the runtime version, whose major number picks the compiled
//! bundle variant (`9.x-mpy`).

use crate::config::SOURCE_SUFFIX;
use crate::error::Result;
use crate::settings::{RUNTIME_VERSION_KEY, SettingsStore};
use std::path::Path;
use tracing::{debug, info, warn};

/// Marker file probed at the project root
pub const VERSION_MARKER: &str = "boot_out.txt";

/// Extension of source-form single-file packages
pub const SOURCE_EXT: &str = "py";

/// Extension of binary-form single-file packages
pub const BINARY_EXT: &str = "mpy";

/// The bundle variant packages are installed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTarget {
    /// Runtime version, if known
    pub version: Option<String>,
    /// Selected bundle suffix (`py`, `9.x-mpy`, ...)
    pub suffix: String,
}

impl RuntimeTarget {
    /// Source-form target
    pub fn source() -> Self {
        Self {
            version: None,
            suffix: SOURCE_SUFFIX.to_string(),
        }
    }

    /// Target for a known suffix
    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            version: None,
            suffix: suffix.to_string(),
        }
    }

    /// Pick the suffix for a runtime version among the configured suffixes
    pub fn for_version(version: Option<&str>, suffixes: &[String]) -> Self {
        let Some(version) = version else {
            return Self::source();
        };

        let major = version.split('.').next().unwrap_or_default();
        let wanted = format!("{major}.x-mpy");
        let suffix = if !major.is_empty() && suffixes.iter().any(|s| *s == wanted) {
            wanted
        } else {
            warn!(
                "No compiled bundle variant for runtime {} (wanted {}), using source packages",
                version, wanted
            );
            SOURCE_SUFFIX.to_string()
        };

        Self {
            version: Some(version.to_string()),
            suffix,
        }
    }

    /// True when installing compiled (`.mpy`) files
    pub fn is_binary(&self) -> bool {
        self.suffix != SOURCE_SUFFIX
    }

    /// Extension single-file packages are installed with
    pub fn file_ext(&self) -> &'static str {
        if self.is_binary() { BINARY_EXT } else { SOURCE_EXT }
    }
}

/// Read the runtime version from a project's marker file
pub fn probe_marker(project_root: &Path) -> Option<String> {
    let path = project_root.join(VERSION_MARKER);
    let content = std::fs::read_to_string(&path).ok()?;
    let version = parse_marker(&content);
    if version.is_none() {
        debug!("{} present but has no version token", path.display());
    }
    version
}

/// Third space-delimited token of the first line
pub fn parse_marker(content: &str) -> Option<String> {
    content
        .lines()
        .next()?
        .split(' ')
        .filter(|t| !t.is_empty())
        .nth(2)
        .map(|t| t.trim_end_matches(';').to_string())
}

/// Resolve the runtime target for a project
///
/// The marker wins over the persisted setting. The resolved version is
/// written back to the settings store for reuse.
pub fn resolve(
    project_root: &Path,
    settings: &mut dyn SettingsStore,
    suffixes: &[String],
) -> Result<RuntimeTarget> {
    let version = match probe_marker(project_root) {
        Some(v) => {
            info!("Detected runtime {} from {}", v, VERSION_MARKER);
            Some(v)
        }
        None => settings.get(RUNTIME_VERSION_KEY),
    };

    if let Some(v) = &version {
        settings.set(RUNTIME_VERSION_KEY, v)?;
    }

    Ok(RuntimeTarget::for_version(version.as_deref(), suffixes))
}
