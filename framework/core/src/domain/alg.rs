// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Algorithm Handle
//!
//! Identity and configuration ownership shared by every algorithm, whether it
//! runs in-process or behind a remote stub.
//!
//! ## Configuration contract
//!
//! - [`Alg::config`] returns the live configuration, never a copy.
//! - [`Alg::create_default_config`] builds a *new* bag with the algorithm's
//!   defaults. It seeds the live config at construction and on every reset.
//! - [`Alg::reset_config`] clears the live bag in place and refills it, so
//!   outside holders of the handle see the reset.

use crate::domain::config::{ConfigError, DataConfig, SharedConfig};
use crate::domain::dataset::DatasetError;
use crate::domain::kbase::KBaseError;
use crate::domain::learning::LearnControlError;
use crate::domain::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgKind {
    MemoryBased,
    ModelBased,
    Composite,
    /// Reached through a remote stub
    Service,
}

impl fmt::Display for AlgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlgKind::MemoryBased => "memory-based",
            AlgKind::ModelBased => "model-based",
            AlgKind::Composite => "composite",
            AlgKind::Service => "service",
        };
        f.write_str(label)
    }
}

/// Algorithm errors
#[derive(Debug, Error)]
pub enum AlgError {
    #[error("Algorithm is not set up: {0}")]
    NotSetup(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Algorithm not found: {0}")]
    NotFound(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Algorithm handle has been released")]
    Released,

    /// Uniform failure for anything crossing the local/remote boundary
    #[error("Remote failure: {0}")]
    Remote(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    KBase(#[from] KBaseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Learn(#[from] LearnControlError),
}

impl AlgError {
    /// Collapse into the remote failure kind, keeping the message
    pub fn into_remote(self) -> AlgError {
        match self {
            AlgError::Remote(message) => AlgError::Remote(message),
            other => AlgError::Remote(other.to_string()),
        }
    }
}

pub trait Alg: Send + Sync {
    /// Stable registry identity
    fn name(&self) -> String;

    fn kind(&self) -> AlgKind;

    /// Live configuration
    fn config(&self) -> SharedConfig;

    fn create_default_config(&self) -> DataConfig;

    fn reset_config(&self) {
        let defaults = self.create_default_config();
        let config = self.config();
        let mut config = config.write();
        config.clear();
        config.clear_read_only();
        config.put_all(&defaults);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::SUPPORT_CACHE_FIELD;
    use std::sync::Arc;

    struct Fixture {
        config: SharedConfig,
    }

    impl Alg for Fixture {
        fn name(&self) -> String {
            "fixture".to_string()
        }

        fn kind(&self) -> AlgKind {
            AlgKind::MemoryBased
        }

        fn config(&self) -> SharedConfig {
            Arc::clone(&self.config)
        }

        fn create_default_config(&self) -> DataConfig {
            let mut config = DataConfig::new();
            config.put_unchecked(SUPPORT_CACHE_FIELD, true);
            config
        }
    }

    #[test]
    fn test_reset_config_keeps_identity() {
        let alg = Fixture {
            config: DataConfig::new().shared(),
        };
        let held = alg.config();
        held.write().put("custom", 1).unwrap();

        alg.reset_config();

        assert!(Arc::ptr_eq(&held, &alg.config()));
        assert!(held.read().get("custom").is_none());
        assert_eq!(held.read().get_as_bool(SUPPORT_CACHE_FIELD), Some(true));
    }

    #[test]
    fn test_into_remote_keeps_message() {
        let err = AlgError::NotSetup("user_knn".to_string()).into_remote();
        match err {
            AlgError::Remote(message) => assert!(message.contains("user_knn")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
