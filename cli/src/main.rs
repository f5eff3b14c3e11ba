// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # recforge CLI
//!
//! The `recforge` binary hosts recommendation algorithms as network services
//! and talks to them as a client.
//!
//! ## Commands
//!
//! - `recforge serve` - Set up and export the algorithms of a host manifest
//! - `recforge list` - Registered algorithms and their kinds
//! - `recforge recommend` - Local in-process recommendation
//! - `recforge remote recommend|estimate` - Calls through a remote stub
//! - `recforge config show|validate|generate` - Host manifest management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use recforge_cli::commands::{self, ConfigCommand, RecommendArgs, RemoteCommand, ServeArgs};

/// recforge - Recommendation algorithms, local or as services
#[derive(Parser)]
#[command(name = "recforge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the host manifest (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "RECFORGE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RECFORGE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the algorithms of the host manifest until interrupted
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// List registered algorithms
    #[command(name = "list")]
    List,

    /// Recommend locally from a dataset snapshot
    #[command(name = "recommend")]
    Recommend(RecommendArgs),

    /// Call an exported algorithm
    #[command(name = "remote")]
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },

    /// Host manifest management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Serve(args)) => commands::serve::run(args, cli.config).await,
        Some(Commands::List) => commands::list::run().await,
        Some(Commands::Recommend(args)) => commands::recommend::run(args).await,
        Some(Commands::Remote { command }) => commands::remote::handle_command(command).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
