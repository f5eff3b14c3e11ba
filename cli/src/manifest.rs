// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Host Manifest
//!
//! YAML description of what `recforge serve` exports: listen address,
//! knowledge-base root, the dataset snapshot algorithms are set up on, and
//! the algorithms themselves with their config overrides.
//!
//! ```yaml
//! host: 127.0.0.1
//! port: 7878
//! kb_root: ./kbase
//! dataset: ./ratings.json
//! algorithms:
//!   - name: item_mean
//!   - name: user_knn
//!     config:
//!       neighbors: 10
//! ```

use anyhow::{Context, Result};
use recforge_core::domain::dataset::Dataset;
use recforge_core::infrastructure::dataset::MemDataset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST_FILE: &str = "recforge.yaml";
pub const DEFAULT_PORT: u16 = 7878;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostManifest {
    /// Interface the export host binds
    pub host: String,
    /// Port shared by every algorithm without its own
    pub port: u16,
    /// Directory knowledge bases are persisted under
    pub kb_root: PathBuf,
    /// Keep one knowledge base per algorithm instead of timestamped stores
    pub fixed_store: bool,
    /// Dataset snapshot (JSON) algorithms are set up on
    pub dataset: Option<PathBuf>,
    /// Prometheus listener port
    pub metrics_port: Option<u16>,
    pub algorithms: Vec<AlgorithmEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Set up from the persisted knowledge base instead of learning again
    #[serde(default)]
    pub load_kbase: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl Default for HostManifest {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            kb_root: PathBuf::from("./kbase"),
            fixed_store: true,
            dataset: None,
            metrics_port: None,
            algorithms: Vec::new(),
        }
    }
}

impl HostManifest {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let manifest = serde_yaml::from_str(yaml)?;
        Ok(manifest)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// `./recforge.yaml` when present
    pub fn discover() -> Option<PathBuf> {
        let cwd = PathBuf::from(format!("./{DEFAULT_MANIFEST_FILE}"));
        cwd.exists().then_some(cwd)
    }

    /// Explicit path (must load), else the discovered manifest, else defaults
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading host manifest from explicit path: {:?}", path);
            return Self::from_yaml_file(&path)
                .with_context(|| format!("Failed to load host manifest at {:?}", path));
        }

        match Self::discover() {
            Some(path) => {
                tracing::info!("Loading host manifest from discovered path: {:?}", path);
                Self::from_yaml_file(&path)
                    .with_context(|| format!("Failed to load host manifest at {:?}", path))
            }
            None => {
                tracing::warn!("No host manifest found. Using defaults.");
                Ok(Self::default())
            }
        }
    }

    /// Check the manifest against the algorithm names the host can build
    pub fn validate(&self, known_algorithms: &[String]) -> Result<()> {
        if self.host.is_empty() {
            anyhow::bail!("host cannot be empty");
        }

        let mut seen = BTreeSet::new();
        for entry in &self.algorithms {
            if entry.name.is_empty() {
                anyhow::bail!("algorithm name cannot be empty");
            }
            if !known_algorithms.contains(&entry.name) {
                anyhow::bail!(
                    "Unknown algorithm '{}'. Known: {}",
                    entry.name,
                    known_algorithms.join(", ")
                );
            }
            let key = (entry.name.as_str(), entry.port.unwrap_or(self.port));
            if !seen.insert(key) {
                anyhow::bail!(
                    "Algorithm '{}' is listed twice on port {}",
                    entry.name,
                    key.1
                );
            }
            if entry.load_kbase && !self.fixed_store {
                anyhow::bail!(
                    "Algorithm '{}' loads its knowledge base, which needs fixed_store: true",
                    entry.name
                );
            }
            if !entry.load_kbase && self.dataset.is_none() {
                anyhow::bail!(
                    "Algorithm '{}' learns from a dataset but no dataset is configured",
                    entry.name
                );
            }
        }

        Ok(())
    }

    /// Read the configured dataset snapshot
    pub fn load_dataset(&self) -> Result<Option<MemDataset>> {
        self.dataset.as_deref().map(load_dataset_file).transpose()
    }
}

/// Read a JSON dataset snapshot. A snapshot without a URI is addressed by
/// its file path so knowledge bases learned from it can reconnect.
pub fn load_dataset_file(path: &Path) -> Result<MemDataset> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read dataset {:?}", path))?;
    let dataset = MemDataset::from_json(&bytes)
        .with_context(|| format!("Failed to parse dataset {:?}", path))?;
    if dataset.uri().is_some() {
        Ok(dataset)
    } else {
        Ok(dataset.with_uri(format!("file://{}", path.display())))
    }
}
