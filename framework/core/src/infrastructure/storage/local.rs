// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Knowledge Base Storage
//!
//! Filesystem-backed implementation of `KBaseStorage`. Store URIs are resolved
//! relative to a base directory (the host's knowledge-base root).
//!
//! **Limitations:**
//! - Single node only; no locking across processes sharing the same root
//! - Writes are not atomic; a crash mid-write leaves a truncated artifact

use crate::domain::config::StoreUri;
use crate::domain::storage::{KBaseStorage, StorageError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Local filesystem knowledge base storage
pub struct LocalKBaseStorage {
    /// Root directory for all stores (e.g., "/var/lib/recforge/kb")
    base_path: PathBuf,
}

impl LocalKBaseStorage {
    /// Create new local storage rooted at `base_path`
    ///
    /// # Arguments
    /// * `base_path` - Root directory, created if missing
    ///
    /// # Returns
    /// * `Result<Self, StorageError>` - Storage instance or error
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::IoError(format!(
                "Failed to create base directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a store URI to an absolute filesystem path
    fn resolve_path(&self, uri: &StoreUri) -> Result<PathBuf, StorageError> {
        // Remove leading slash if present
        let path = uri.as_str().strip_prefix('/').unwrap_or(uri.as_str());
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(StorageError::InvalidPath(uri.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

fn map_io_error(uri: &StoreUri, action: &str, e: std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::FileNotFound(uri.to_string()),
        ErrorKind::PermissionDenied => StorageError::PermissionDenied(uri.to_string()),
        _ => StorageError::IoError(format!("Failed to {} {}: {}", action, uri, e)),
    }
}

#[async_trait]
impl KBaseStorage for LocalKBaseStorage {
    async fn exists(&self, uri: &StoreUri) -> Result<bool, StorageError> {
        let fs_path = self.resolve_path(uri)?;
        tokio::fs::try_exists(&fs_path)
            .await
            .map_err(|e| map_io_error(uri, "stat", e))
    }

    async fn create_dir(&self, uri: &StoreUri) -> Result<(), StorageError> {
        let fs_path = self.resolve_path(uri)?;
        tokio::fs::create_dir_all(&fs_path)
            .await
            .map_err(|e| map_io_error(uri, "create directory", e))
    }

    async fn clear_content(&self, uri: &StoreUri, name_prefix: &str) -> Result<usize, StorageError> {
        let fs_path = self.resolve_path(uri)?;
        if !tokio::fs::try_exists(&fs_path)
            .await
            .map_err(|e| map_io_error(uri, "stat", e))?
        {
            return Ok(0);
        }

        let mut entries = tokio::fs::read_dir(&fs_path)
            .await
            .map_err(|e| map_io_error(uri, "list directory", e))?;

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| map_io_error(uri, "read directory entry", e))?
        {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(name_prefix) {
                continue;
            }

            let file_type = entry
                .file_type()
                .await
                .map_err(|e| map_io_error(uri, "get metadata", e))?;
            let result = if file_type.is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await
            } else {
                tokio::fs::remove_file(entry.path()).await
            };
            result.map_err(|e| map_io_error(uri, "remove entry", e))?;
            removed += 1;
        }

        debug!(uri = %uri, prefix = name_prefix, removed, "Cleared store content");
        Ok(removed)
    }

    async fn read(&self, uri: &StoreUri) -> Result<Vec<u8>, StorageError> {
        let fs_path = self.resolve_path(uri)?;
        tokio::fs::read(&fs_path)
            .await
            .map_err(|e| map_io_error(uri, "read", e))
    }

    async fn write(&self, uri: &StoreUri, bytes: &[u8]) -> Result<(), StorageError> {
        let fs_path = self.resolve_path(uri)?;
        if let Some(parent) = fs_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(uri, "create parent directory", e))?;
        }
        tokio::fs::write(&fs_path, bytes)
            .await
            .map_err(|e| map_io_error(uri, "write", e))
    }
}
