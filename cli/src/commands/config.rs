// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host manifest commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use recforge_core::domain::alg::Alg;

use super::{builtin_registry, scratch_context};
use crate::manifest::{HostManifest, DEFAULT_MANIFEST_FILE};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective host manifest
    Show {
        /// Show manifest paths checked
        #[arg(long)]
        paths: bool,

        /// Also print the default config of every registered algorithm
        #[arg(long)]
        defaults: bool,
    },

    /// Validate a host manifest
    Validate {
        /// Path to manifest (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a sample host manifest
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./recforge.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, defaults } => show(config_override, paths, defaults).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, show_defaults: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Manifest discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag / RECFORGE_CONFIG_PATH: {}", path.display());
        } else {
            println!("  1. --config flag / RECFORGE_CONFIG_PATH: {}", "(not set)".dimmed());
        }
        println!("  2. ./{}", DEFAULT_MANIFEST_FILE);
        println!();
    }

    let manifest = HostManifest::load_or_default(config_override)
        .context("Failed to load host manifest")?;

    println!("{}", "Current host manifest:".bold());
    println!();
    println!("{}", "Listener:".bold());
    println!("  Address: {}:{}", manifest.host, manifest.port);
    match manifest.metrics_port {
        Some(port) => println!("  Metrics port: {}", port),
        None => println!("  Metrics port: {}", "(disabled)".dimmed()),
    }
    println!();

    println!("{}", "Knowledge bases:".bold());
    println!("  Root: {}", manifest.kb_root.display());
    println!("  Fixed store: {}", manifest.fixed_store);
    match &manifest.dataset {
        Some(path) => println!("  Dataset: {}", path.display()),
        None => println!("  Dataset: {}", "(none)".dimmed()),
    }
    println!();

    println!("{}", "Algorithms:".bold());
    for entry in &manifest.algorithms {
        let port = entry.port.unwrap_or(manifest.port);
        let source = if entry.load_kbase { "knowledge base" } else { "dataset" };
        println!("  {} (port {}, from {})", entry.name.bold(), port, source);
        for (key, value) in &entry.config {
            println!("    {} = {}", key, value);
        }
    }
    println!();

    if show_defaults {
        let context = scratch_context();
        let registry = builtin_registry(&context);
        println!("{}", "Algorithm defaults:".bold());
        for name in registry.names() {
            let alg = registry.get(&name).await?;
            println!("  {}", name.bold());
            let defaults = alg.create_default_config();
            for key in defaults.keys() {
                if let Some(value) = defaults.get(key) {
                    println!("    {} = {}", key, value);
                }
            }
        }
        println!();
    }

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating host manifest...");

    let manifest = HostManifest::load_or_default(config_path)
        .context("Failed to load host manifest")?;

    let registry = builtin_registry(&scratch_context());
    manifest
        .validate(&registry.names())
        .context("Host manifest validation failed")?;

    if let Some(path) = &manifest.dataset {
        manifest
            .load_dataset()
            .with_context(|| format!("Dataset {:?} is not usable", path))?;
    }

    println!("{}", "✓ Host manifest is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/recforge-with-examples.yaml")
    } else {
        include_str!("../../templates/recforge-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write manifest to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Host manifest generated: {}", output.display()).green()
    );

    Ok(())
}
