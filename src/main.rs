// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! bundlehost CLI - load bundle manifests and resolve their modules
//!
//! ## Features
//!
//! - Load any number of bundle manifests into one shared registry
//! - Resolve a module and print its exports (plain or JSON)
//! - Inspect the registry and the effective configuration
//! - Interactive REPL with id completion and history

mod repl;

use anyhow::Context;
use bundlehost_runtime::{Host, HostConfig, ModuleStatus, VERSION};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "bundlehost",
    about = "Load self-registering bundles and resolve their modules",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Bundle manifest to load (repeatable, loaded in order)
    #[arg(short = 'b', long = "bundle", global = true)]
    bundles: Vec<PathBuf>,

    /// Configuration file (key=value lines)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a module and print its exports
    Resolve {
        /// Module id
        id: String,

        /// Print exports as JSON (evaluates lazy exports)
        #[arg(long)]
        json: bool,
    },

    /// List registered modules
    #[command(alias = "ls")]
    List,

    /// Print the effective configuration, or a single value
    Config {
        /// Configuration key (e.g. duplicate-log)
        key: Option<String>,
    },

    /// Start interactive REPL
    #[command(alias = "i")]
    Repl,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "bundlehost=debug,bundlehost_runtime=debug"
    } else {
        "bundlehost=warn,bundlehost_runtime=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => HostConfig::load_from(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => HostConfig::load()?,
    };

    let host = Host::install_global(Host::new(config)).unwrap_or_else(|_| Host::global());

    for path in &cli.bundles {
        let loader = host
            .load_manifest(path)
            .with_context(|| format!("failed to load bundle {}", path.display()))?;
        tracing::info!("Loaded bundle '{}' from {}", loader.name(), path.display());
    }

    match cli.command {
        Command::Resolve { id, json } => {
            let value = host.require(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&value.to_json()?)?);
            } else {
                println!("{}", repl::format_value(&value));
            }
        }
        Command::List => print_modules(host),
        Command::Config { key: None } => {
            println!("{}", serde_json::to_string_pretty(host.config())?);
        }
        Command::Config { key: Some(key) } => match host.config().get(&key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("unknown configuration key '{}'", key),
        },
        Command::Repl => {
            let mut repl = repl::Repl::new(host)?;
            repl.run()?;
        }
    }

    Ok(())
}

/// Print the registry as a table
pub(crate) fn print_modules(host: &Host) {
    let modules = host.registry().snapshot();
    if modules.is_empty() {
        println!("{}", "No modules registered".dimmed());
        return;
    }

    let width = modules
        .iter()
        .map(|m| m.id.as_str().len())
        .max()
        .unwrap_or(0)
        .max(2);

    println!(
        "{:width$}  {:16}  {}",
        "ID".white().bold(),
        "BUNDLE".white().bold(),
        "STATUS".white().bold(),
        width = width
    );
    for module in modules {
        let status = match module.status {
            ModuleStatus::Resolved => module.status.to_string().green().to_string(),
            ModuleStatus::Resolving => module.status.to_string().yellow().to_string(),
            ModuleStatus::Unresolved => module.status.to_string().dimmed().to_string(),
        };
        println!(
            "{:width$}  {:16}  {}",
            module.id.as_str().cyan(),
            module.bundle,
            status,
            width = width
        );
    }
}
