// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Knowledge Base Storage Abstraction
//!
//! Defines the storage adapter knowledge bases persist through. The domain
//! only sees store URIs (slash separated, relative to the adapter's root);
//! concrete adapters live in `crate::infrastructure::storage`.
//!
//! **Artifacts:** a knowledge base named `kb` stored under `<store>` writes
//! `<store>/kb_config.json` and, for algorithms with a learned payload,
//! `<store>/kb_model.json`. Clearing removes every entry under `<store>`
//! whose name starts with `kb`.

use crate::domain::config::StoreUri;
use async_trait::async_trait;
use thiserror::Error;

/// Storage adapter for knowledge base artifacts
#[async_trait]
pub trait KBaseStorage: Send + Sync {
    /// Check whether a file or directory exists at `uri`
    async fn exists(&self, uri: &StoreUri) -> Result<bool, StorageError>;

    /// Create a directory (and parents). Existing directories are fine.
    async fn create_dir(&self, uri: &StoreUri) -> Result<(), StorageError>;

    /// Delete entries directly under `uri` whose name starts with `name_prefix`
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of entries removed (0 when `uri` does not exist)
    /// * `Err(StorageError)` if removal failed
    async fn clear_content(&self, uri: &StoreUri, name_prefix: &str) -> Result<usize, StorageError>;

    /// Read a whole artifact
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - Artifact bytes
    /// * `Err(StorageError::FileNotFound)` if nothing is stored at `uri`
    async fn read(&self, uri: &StoreUri) -> Result<Vec<u8>, StorageError>;

    /// Write a whole artifact, replacing any previous content
    async fn write(&self, uri: &StoreUri, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}
