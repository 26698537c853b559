// src/cli/mod.rs
//! CLI definitions for cpbundle
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Bundle commands:
//! - `fetch` - Download and verify the latest (or a given) bundle release
//! - `tags` - Show cached bundle releases
//! - `runtime` - Show or set the project's runtime version
//!
//! Library commands:
//! - `list` - Reconcile the bundle against the project
//! - `install` - Install or update libraries by name
//! - `select` - Pick a library interactively
//! - `upgrade` - Update every outdated library

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cpbundle")]
#[command(author = "cpbundle Contributors")]
#[command(version)]
#[command(about = "Manage CircuitPython bundle libraries in a project", long_about = None)]
pub struct Cli {
    /// Project directory (holds lib/ and boot_out.txt)
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Configuration file (default: <config-dir>/cpbundle/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    // =========================================================================
    // Bundle
    // =========================================================================
    /// Download the latest bundle release and make it current
    Fetch {
        /// Fetch this release tag instead of the latest
        #[arg(long)]
        tag: Option<String>,
    },

    /// Show cached bundle releases
    Tags,

    /// Show the detected runtime version and bundle variant
    Runtime {
        /// Persist this runtime version for the project
        #[arg(long)]
        set: Option<String>,
    },

    // =========================================================================
    // Libraries
    // =========================================================================
    /// List bundle libraries and their state in the project
    List {
        /// Only libraries present in the project
        #[arg(long)]
        installed: bool,

        /// Only installed libraries with a different bundle version
        #[arg(long, conflicts_with = "installed")]
        updates: bool,
    },

    /// Install or update libraries by name
    Install {
        /// Library names as listed by `cpbundle list`
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Choose a library to install or update interactively
    Select {
        /// Only offer libraries present in the project
        #[arg(long)]
        installed: bool,
    },

    /// Update every installed library whose bundle version differs
    Upgrade,
}
