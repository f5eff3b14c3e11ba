// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Algorithm Configuration
//!
//! `DataConfig` is the key/value bag every algorithm and knowledge base owns.
//! Values are JSON values so the same bag can be persisted by the knowledge
//! base storage adapter and shipped across the remote boundary unchanged.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Read-only key protection, store location, dataset metadata
//!
//! The live configuration of an algorithm is handed out as a [`SharedConfig`]
//! (`Arc<RwLock<DataConfig>>`). Callers that hold the handle observe in-place
//! resets, which is why `reset_config` clears and repopulates instead of
//! swapping the allocation.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Live, shared handle to a configuration bag
pub type SharedConfig = Arc<RwLock<DataConfig>>;

pub const MIN_RATING_FIELD: &str = "min_rating";
pub const MAX_RATING_FIELD: &str = "max_rating";
pub const STORE_URI_FIELD: &str = "store_uri";
pub const KBASE_NAME_FIELD: &str = "kbase_name";
pub const DATASOURCE_URI_FIELD: &str = "datasource_uri";
pub const SUPPORT_CACHE_FIELD: &str = "support_cache";
pub const FAST_RECOMMEND_FIELD: &str = "fast_recommend";
pub const RESERVED_RECOMMEND_FIELD: &str = "reserved_recommend";
pub const RELEVANT_RATING_FIELD: &str = "relevant_rating";
pub const MINMAX_RATING_RECONFIG_FIELD: &str = "minmax_rating_reconfig";
pub const DUPLICATABLE_FIELD: &str = "duplicatable";

pub const SUPPORT_CACHE_DEFAULT: bool = true;
pub const MINMAX_RATING_RECONFIG_DEFAULT: bool = false;

/// Errors raised by configuration writes and persistence
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration key is read-only: {0}")]
    ReadOnly(String),

    #[error("Configuration serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serialization(err.to_string())
    }
}

/// Location of persisted artifacts, written as a slash separated path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreUri(String);

impl StoreUri {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let trimmed = uri.trim_end_matches('/');
        if trimmed.is_empty() {
            Self(uri)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Append a child segment
    pub fn concat(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        if self.0.is_empty() {
            Self(segment.to_string())
        } else {
            Self(format!("{}/{}", self.0, segment))
        }
    }

    /// Last path segment, used by name filters when clearing a store
    pub fn last_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive data inherited from the dataset an algorithm is set up on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub min_rating: f64,
    pub max_rating: f64,
    #[serde(default)]
    pub user_count: usize,
    #[serde(default)]
    pub item_count: usize,
}

impl DatasetMetadata {
    pub fn new(min_rating: f64, max_rating: f64) -> Self {
        Self {
            min_rating,
            max_rating,
            user_count: 0,
            item_count: 0,
        }
    }
}

/// Mutable key/value configuration with read-only key enforcement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    entries: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    read_only: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<DatasetMetadata>,
}

impl DataConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap into a live shared handle
    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Put a value, rejecting keys currently marked read-only
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ConfigError> {
        let key = key.into();
        if self.read_only.contains(&key) {
            return Err(ConfigError::ReadOnly(key));
        }
        self.entries.insert(key, value.into());
        Ok(())
    }

    /// Put a value regardless of read-only marks.
    ///
    /// Reserved for the framework itself (knowledge base learning, rating
    /// bound reconfiguration); user-facing writes go through [`put`](Self::put).
    pub fn put_unchecked(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, ConfigError> {
        if self.read_only.contains(key) {
            return Err(ConfigError::ReadOnly(key.to_string()));
        }
        Ok(self.entries.remove(key))
    }

    pub fn remove_unchecked(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Copy every entry of `other`, skipping keys that are read-only here.
    /// Read-only marks of `other` are carried over for keys it defines.
    pub fn put_all(&mut self, other: &DataConfig) {
        for (key, value) in &other.entries {
            if self.read_only.contains(key) {
                continue;
            }
            self.entries.insert(key.clone(), value.clone());
        }
        for key in &other.read_only {
            if other.entries.contains_key(key) {
                self.read_only.insert(key.clone());
            }
        }
        if other.metadata.is_some() {
            self.metadata = other.metadata.clone();
        }
    }

    /// Overwrite with every entry, mark and metadata of `other`, ignoring
    /// read-only marks. Used when restoring a persisted configuration.
    pub fn put_all_unchecked(&mut self, other: &DataConfig) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
        self.read_only.extend(other.read_only.iter().cloned());
        if other.metadata.is_some() {
            self.metadata = other.metadata.clone();
        }
    }

    /// Remove all entries and metadata. Read-only marks survive.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.metadata = None;
    }

    pub fn add_read_only(&mut self, key: impl Into<String>) {
        self.read_only.insert(key.into());
    }

    pub fn remove_read_only(&mut self, key: &str) {
        self.read_only.remove(key);
    }

    pub fn is_read_only(&self, key: &str) -> bool {
        self.read_only.contains(key)
    }

    pub fn clear_read_only(&mut self) {
        self.read_only.clear();
    }

    pub fn get_as_bool(&self, key: &str) -> Option<bool> {
        self.entries.get(key).and_then(Value::as_bool)
    }

    pub fn get_as_f64(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    pub fn get_as_i64(&self, key: &str) -> Option<i64> {
        self.entries.get(key).and_then(Value::as_i64)
    }

    pub fn get_as_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn store_uri(&self) -> Option<StoreUri> {
        self.get_as_str(STORE_URI_FIELD).map(StoreUri::new)
    }

    pub fn set_store_uri(&mut self, uri: &StoreUri) {
        self.entries
            .insert(STORE_URI_FIELD.to_string(), Value::String(uri.as_str().to_string()));
    }

    pub fn min_rating(&self) -> Option<f64> {
        self.get_as_f64(MIN_RATING_FIELD)
    }

    pub fn max_rating(&self) -> Option<f64> {
        self.get_as_f64(MAX_RATING_FIELD)
    }

    pub fn metadata(&self) -> Option<&DatasetMetadata> {
        self.metadata.as_ref()
    }

    /// Inherit dataset metadata. Rating bounds are copied into the entries
    /// even when they are marked read-only.
    pub fn set_metadata(&mut self, metadata: DatasetMetadata) {
        self.entries
            .insert(MIN_RATING_FIELD.to_string(), Value::from(metadata.min_rating));
        self.entries
            .insert(MAX_RATING_FIELD.to_string(), Value::from(metadata.max_rating));
        self.metadata = Some(metadata);
    }

    pub fn clear_metadata(&mut self) {
        self.metadata = None;
    }

    pub fn is_cached(&self) -> bool {
        self.get_as_bool(SUPPORT_CACHE_FIELD).unwrap_or(false)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
