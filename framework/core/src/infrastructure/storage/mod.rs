// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Storage Infrastructure Module
//!
//! Concrete implementations of the `KBaseStorage` trait.

pub mod local;

pub use local::LocalKBaseStorage;

use crate::domain::config::StoreUri;
use crate::domain::storage::{KBaseStorage, StorageError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Storage backend configuration
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// Local filesystem storage
    Local { base_path: String },

    /// In-memory storage for tests and throwaway hosts
    InMemory,
}

/// Factory function to create a storage adapter from configuration
pub fn create_kbase_storage(backend: StorageBackend) -> Result<Arc<dyn KBaseStorage>, StorageError> {
    match backend {
        StorageBackend::Local { base_path } => Ok(Arc::new(LocalKBaseStorage::new(base_path)?)),
        StorageBackend::InMemory => Ok(Arc::new(InMemoryKBaseStorage::new())),
    }
}

/// In-memory knowledge base storage: a flat path → bytes table
#[derive(Default)]
pub struct InMemoryKBaseStorage {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryKBaseStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }
}

fn dir_prefix(uri: &StoreUri) -> String {
    format!("{}/", uri.as_str().trim_start_matches('/'))
}

fn key(uri: &StoreUri) -> String {
    uri.as_str().trim_start_matches('/').to_string()
}

#[async_trait]
impl KBaseStorage for InMemoryKBaseStorage {
    async fn exists(&self, uri: &StoreUri) -> Result<bool, StorageError> {
        let files = self.files.read();
        let prefix = dir_prefix(uri);
        Ok(files.contains_key(&key(uri)) || files.keys().any(|k| k.starts_with(&prefix)))
    }

    async fn create_dir(&self, _uri: &StoreUri) -> Result<(), StorageError> {
        Ok(())
    }

    async fn clear_content(&self, uri: &StoreUri, name_prefix: &str) -> Result<usize, StorageError> {
        let prefix = dir_prefix(uri);
        let mut files = self.files.write();
        let doomed: Vec<String> = files
            .keys()
            .filter(|k| {
                k.strip_prefix(&prefix)
                    .and_then(|rest| rest.split('/').next())
                    .is_some_and(|child| child.starts_with(name_prefix))
            })
            .cloned()
            .collect();

        let removed = doomed
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix).and_then(|rest| rest.split('/').next()))
            .collect::<BTreeSet<&str>>()
            .len();

        for k in &doomed {
            files.remove(k);
        }
        Ok(removed)
    }

    async fn read(&self, uri: &StoreUri) -> Result<Vec<u8>, StorageError> {
        self.files
            .read()
            .get(&key(uri))
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(uri.to_string()))
    }

    async fn write(&self, uri: &StoreUri, bytes: &[u8]) -> Result<(), StorageError> {
        self.files.write().insert(key(uri), bytes.to_vec());
        Ok(())
    }
}
