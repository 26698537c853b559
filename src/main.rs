// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let project = cli.project.as_path();
    let config = cli.config.as_deref();

    match cli.command {
        // =====================================================================
        // Bundle
        // =====================================================================
        Commands::Fetch { tag } => commands::cmd_fetch(config, tag.as_deref()),
        Commands::Tags => commands::cmd_tags(config),
        Commands::Runtime { set } => commands::cmd_runtime(project, config, set.as_deref()),

        // =====================================================================
        // Libraries
        // =====================================================================
        Commands::List { installed, updates } => {
            commands::cmd_list(project, config, installed, updates)
        }
        Commands::Install { names } => commands::cmd_install(project, config, &names),
        Commands::Select { installed } => commands::cmd_select(project, config, installed),
        Commands::Upgrade => commands::cmd_upgrade(project, config),
    }
}
