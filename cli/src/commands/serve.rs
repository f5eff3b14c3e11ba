// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `recforge serve`: set up every algorithm of the host manifest, export it,
//! and keep the host running until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use recforge_core::application::export::ExportHost;
use recforge_core::domain::alg::Alg;
use recforge_core::domain::config::StoreUri;
use recforge_core::domain::dataset::{Dataset, DatasetPointer};
use recforge_core::domain::kbase::KBaseContext;
use recforge_core::domain::recommender::Recommender;
use recforge_core::infrastructure::dataset::MemDatasetCatalog;
use recforge_core::infrastructure::storage::LocalKBaseStorage;
use recforge_core::presentation::wire::RemoteHandle;

use super::builtin_registry;
use crate::manifest::HostManifest;

#[derive(Args)]
pub struct ServeArgs {
    /// Override the manifest listen host
    #[arg(long, env = "RECFORGE_HOST")]
    pub host: Option<String>,

    /// Override the manifest port
    #[arg(long, env = "RECFORGE_PORT")]
    pub port: Option<u16>,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "RECFORGE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

pub async fn run(args: ServeArgs, config_override: Option<PathBuf>) -> Result<()> {
    let mut manifest = HostManifest::load_or_default(config_override)?;
    if let Some(host) = args.host {
        manifest.host = host;
    }
    if let Some(port) = args.port {
        manifest.port = port;
    }

    if let Some(port) = args.metrics_port.or(manifest.metrics_port) {
        install_metrics(port)?;
    }

    let catalog = Arc::new(MemDatasetCatalog::new());
    let dataset: Option<Arc<dyn Dataset>> = match manifest.load_dataset()? {
        Some(dataset) => {
            let dataset: Arc<dyn Dataset> = Arc::new(dataset);
            catalog
                .register(Arc::clone(&dataset))
                .context("Failed to register dataset")?;
            Some(dataset)
        }
        None => None,
    };

    let storage = LocalKBaseStorage::new(&manifest.kb_root)
        .with_context(|| format!("Failed to open knowledge-base root {:?}", manifest.kb_root))?;
    let context = KBaseContext::new(Arc::new(storage), StoreUri::new(""))
        .with_fixed_store(manifest.fixed_store)
        .with_resolver(catalog);
    let registry = builtin_registry(&context);
    manifest.validate(&registry.names())?;

    if manifest.algorithms.is_empty() {
        println!("{}", "No algorithms configured; nothing to export.".yellow());
        return Ok(());
    }

    let host = ExportHost::new(manifest.host.clone());
    let mut handles = Vec::with_capacity(manifest.algorithms.len());
    for entry in &manifest.algorithms {
        let alg = registry
            .get(&entry.name)
            .await
            .with_context(|| format!("Failed to create algorithm '{}'", entry.name))?;

        {
            let config = alg.config();
            let mut config = config.write();
            for (key, value) in &entry.config {
                config
                    .put(key.clone(), value.clone())
                    .with_context(|| format!("Invalid override '{}' for '{}'", key, entry.name))?;
            }
        }

        let target: Arc<dyn Dataset> = if entry.load_kbase {
            Arc::new(DatasetPointer::kbase(None))
        } else {
            dataset
                .clone()
                .with_context(|| format!("No dataset for '{}'", entry.name))?
        };
        info!(alg = %entry.name, load_kbase = entry.load_kbase, "Setting up algorithm");
        alg.setup(target)
            .await
            .with_context(|| format!("Failed to set up '{}'", entry.name))?;

        let handle = host
            .export(alg, entry.port.unwrap_or(manifest.port))
            .await
            .with_context(|| format!("Failed to export '{}'", entry.name))?;
        handles.push(handle);
    }

    print_handles(&handles);
    info!(count = handles.len(), "recforge host ready");

    shutdown_signal().await;

    let count = host.unexport_all().await;
    info!(count, "recforge host shutting down");
    Ok(())
}

fn install_metrics(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

fn print_handles(handles: &[RemoteHandle]) {
    println!("{}", "Exported algorithms:".bold());
    for handle in handles {
        println!("  {} {}", handle.name.bold(), handle.url.green());
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
