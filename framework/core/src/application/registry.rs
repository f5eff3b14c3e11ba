// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Algorithm registry
//!
//! Maps algorithm names to prototype recommenders. `get` never hands out the
//! prototype itself, only a fresh `new_instance()`. The registry is an explicit
//! value passed to whoever needs name lookups.

use crate::domain::alg::{AlgError, AlgKind};
use crate::domain::recommender::Recommender;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Default)]
pub struct AlgRegistry {
    prototypes: Arc<RwLock<BTreeMap<String, Arc<dyn Recommender>>>>,
}

impl AlgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prototype under its own name, replacing any previous one
    pub fn register(&self, prototype: Arc<dyn Recommender>) {
        let name = prototype.name();
        info!(alg = %name, kind = %prototype.kind(), "Registered algorithm");
        self.prototypes.write().insert(name, prototype);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.prototypes.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.prototypes.read().contains_key(name)
    }

    /// Fresh instance of the named algorithm
    pub async fn get(&self, name: &str) -> Result<Arc<dyn Recommender>, AlgError> {
        let prototype = self
            .prototypes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AlgError::NotFound(name.to_string()))?;
        prototype.new_instance().await
    }

    pub fn names(&self) -> Vec<String> {
        self.prototypes.read().keys().cloned().collect()
    }

    pub fn kinds(&self) -> Vec<(String, AlgKind)> {
        self.prototypes
            .read()
            .iter()
            .map(|(name, alg)| (name.clone(), alg.kind()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.prototypes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.read().is_empty()
    }
}
