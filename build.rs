// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common flag: only libraries present in the project
fn installed_arg(help: &'static str) -> Arg {
    Arg::new("installed")
        .long("installed")
        .action(ArgAction::SetTrue)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("cpbundle")
        .version(env!("CARGO_PKG_VERSION"))
        .author("cpbundle Contributors")
        .about("Manage CircuitPython bundle libraries in a project")
        .subcommand_required(true)
        .arg(
            Arg::new("project")
                .short('p')
                .long("project")
                .global(true)
                .default_value(".")
                .help("Project directory (holds lib/ and boot_out.txt)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .value_name("PATH")
                .help("Configuration file (default: <config-dir>/cpbundle/config.toml)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("fetch")
                .about("Download the latest bundle release and make it current")
                .arg(
                    Arg::new("tag")
                        .long("tag")
                        .help("Fetch this release tag instead of the latest"),
                ),
        )
        .subcommand(Command::new("tags").about("Show cached bundle releases"))
        .subcommand(
            Command::new("runtime")
                .about("Show the detected runtime version and bundle variant")
                .arg(
                    Arg::new("set")
                        .long("set")
                        .help("Persist this runtime version for the project"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List bundle libraries and their state in the project")
                .arg(installed_arg("Only libraries present in the project"))
                .arg(
                    Arg::new("updates")
                        .long("updates")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("installed")
                        .help("Only installed libraries with a different bundle version"),
                ),
        )
        .subcommand(
            Command::new("install")
                .about("Install or update libraries by name")
                .arg(
                    Arg::new("names")
                        .required(true)
                        .num_args(1..)
                        .help("Library names as listed by `cpbundle list`"),
                ),
        )
        .subcommand(
            Command::new("select")
                .about("Choose a library to install or update interactively")
                .arg(installed_arg("Only offer libraries present in the project")),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Update every installed library whose bundle version differs"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("cpbundle.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
