// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dataset Capability
//!
//! Algorithms consume rating data through the [`Dataset`] trait only; parsing
//! and storage backends live behind it. Concrete in-memory datasets are in
//! `crate::infrastructure::dataset`.
//!
//! | Type | Role |
//! |------|------|
//! | `Dataset` | Rating vectors, profiles, sampling, exclusivity |
//! | `Fetcher<T>` | Restartable, closeable lazy sequence |
//! | `DatasetPointer` | Forward pointer to data held elsewhere (e.g. a saved knowledge base) |
//! | `Datasource` | A knowledge base's connection to the dataset it learned from |
//! | `DatasetResolver` | Resolves a stored datasource URI back into a dataset |

use crate::domain::config::{DataConfig, DatasetMetadata, SharedConfig, StoreUri};
use crate::domain::rating::{EntityId, Profile, RatingVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Dataset errors
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Dataset URI cannot be resolved: {0}")]
    Unresolvable(String),

    #[error("Invalid dataset: {0}")]
    Invalid(String),

    #[error("Dataset serialization error: {0}")]
    Serialization(String),
}

/// What a dataset object actually is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Carries rating data
    Regular,
    /// Indirection without data
    Pointer,
    /// Indirection to a persisted knowledge base
    KBasePointer,
}

impl DatasetKind {
    pub fn is_pointer(&self) -> bool {
        !matches!(self, DatasetKind::Regular)
    }
}

/// One (user, item, rating) row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingTriple {
    pub user_id: EntityId,
    pub item_id: EntityId,
    pub rating: f64,
}

type IterFactory<T> = Box<dyn Fn() -> Box<dyn Iterator<Item = T> + Send> + Send + Sync>;

/// Restartable lazy sequence.
///
/// The underlying iterator is created on first use and recreated by
/// [`reset`](Fetcher::reset). A closed fetcher yields nothing until reset.
pub struct Fetcher<T> {
    factory: IterFactory<T>,
    current: Option<Box<dyn Iterator<Item = T> + Send>>,
    closed: bool,
}

impl<T: 'static> Fetcher<T> {
    pub fn new<F, I>(factory: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: Iterator<Item = T> + Send + 'static,
    {
        Self {
            factory: Box::new(move || Box::new(factory())),
            current: None,
            closed: false,
        }
    }

    pub fn from_vec(items: Vec<T>) -> Self
    where
        T: Clone + Send + Sync,
    {
        let items = Arc::new(items);
        Self::new(move || {
            let items = Arc::clone(&items);
            (0..items.len()).map(move |i| items[i].clone())
        })
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty::<T>)
    }

    /// Rewind to the first element
    pub fn reset(&mut self) {
        self.current = Some((self.factory)());
        self.closed = false;
    }

    pub fn close(&mut self) {
        self.current = None;
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<T: 'static> Iterator for Fetcher<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.closed {
            return None;
        }
        if self.current.is_none() {
            self.current = Some((self.factory)());
        }
        self.current.as_mut().and_then(|it| it.next())
    }
}

impl<T> fmt::Debug for Fetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("started", &self.current.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Read access to rating data
pub trait Dataset: Send + Sync {
    /// Live configuration of the dataset
    fn config(&self) -> SharedConfig;

    fn kind(&self) -> DatasetKind {
        DatasetKind::Regular
    }

    /// Exclusive datasets are owned by whoever holds them and must be
    /// cleared on teardown
    fn is_exclusive(&self) -> bool;

    fn uri(&self) -> Option<String>;

    fn metadata(&self) -> DatasetMetadata;

    fn fetch_user_ids(&self) -> Fetcher<EntityId>;

    fn fetch_item_ids(&self) -> Fetcher<EntityId>;

    fn fetch_user_ratings(&self) -> Fetcher<RatingVector>;

    fn fetch_item_ratings(&self) -> Fetcher<RatingVector>;

    fn fetch_sample(&self) -> Fetcher<RatingTriple>;

    fn user_rating(&self, user_id: EntityId) -> Option<RatingVector>;

    fn item_rating(&self, item_id: EntityId) -> Option<RatingVector>;

    fn user_profile(&self, user_id: EntityId) -> Option<Profile>;

    fn item_profile(&self, _item_id: EntityId) -> Option<Profile> {
        None
    }

    /// Drop held data
    fn clear(&self);

    /// Serializable copy of the data, if this dataset carries any
    fn snapshot(&self) -> Option<DatasetSnapshot>;
}

/// Serializable dataset content, used for persistence and remote setup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub config: DataConfig,
    #[serde(default)]
    pub user_ratings: Vec<RatingVector>,
    #[serde(default)]
    pub user_profiles: Vec<Profile>,
    #[serde(default)]
    pub item_profiles: Vec<Profile>,
}

/// Forward pointer that carries only a configuration
pub struct DatasetPointer {
    kind: DatasetKind,
    config: SharedConfig,
}

impl DatasetPointer {
    pub fn new(config: DataConfig) -> Self {
        Self {
            kind: DatasetKind::Pointer,
            config: config.shared(),
        }
    }

    /// Pointer to a knowledge base saved under `store`
    pub fn kbase(store: Option<&StoreUri>) -> Self {
        let mut config = DataConfig::new();
        if let Some(store) = store {
            config.set_store_uri(store);
        }
        Self {
            kind: DatasetKind::KBasePointer,
            config: config.shared(),
        }
    }
}

impl Dataset for DatasetPointer {
    fn config(&self) -> SharedConfig {
        Arc::clone(&self.config)
    }

    fn kind(&self) -> DatasetKind {
        self.kind
    }

    fn is_exclusive(&self) -> bool {
        false
    }

    fn uri(&self) -> Option<String> {
        self.config.read().store_uri().map(|uri| uri.to_string())
    }

    fn metadata(&self) -> DatasetMetadata {
        let config = self.config.read();
        DatasetMetadata::new(
            config.min_rating().unwrap_or(0.0),
            config.max_rating().unwrap_or(0.0),
        )
    }

    fn fetch_user_ids(&self) -> Fetcher<EntityId> {
        Fetcher::empty()
    }

    fn fetch_item_ids(&self) -> Fetcher<EntityId> {
        Fetcher::empty()
    }

    fn fetch_user_ratings(&self) -> Fetcher<RatingVector> {
        Fetcher::empty()
    }

    fn fetch_item_ratings(&self) -> Fetcher<RatingVector> {
        Fetcher::empty()
    }

    fn fetch_sample(&self) -> Fetcher<RatingTriple> {
        Fetcher::empty()
    }

    fn user_rating(&self, _user_id: EntityId) -> Option<RatingVector> {
        None
    }

    fn item_rating(&self, _item_id: EntityId) -> Option<RatingVector> {
        None
    }

    fn user_profile(&self, _user_id: EntityId) -> Option<Profile> {
        None
    }

    fn clear(&self) {}

    fn snapshot(&self) -> Option<DatasetSnapshot> {
        None
    }
}

/// Resolves dataset URIs. Passed explicitly wherever a stored URI has to be
/// turned back into a dataset.
pub trait DatasetResolver: Send + Sync {
    fn resolve(&self, uri: &str) -> Result<Arc<dyn Dataset>, DatasetError>;
}

/// Connection from a knowledge base to the dataset it was built from
#[derive(Default)]
pub struct Datasource {
    dataset: Option<Arc<dyn Dataset>>,
    uri: Option<String>,
    auto_close: bool,
}

impl Datasource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, dataset: Arc<dyn Dataset>) {
        self.close();
        self.uri = dataset.uri();
        self.auto_close = dataset.is_exclusive();
        self.dataset = Some(dataset);
    }

    pub fn connect_uri(&mut self, uri: &str, resolver: &dyn DatasetResolver) -> Result<(), DatasetError> {
        let dataset = resolver.resolve(uri)?;
        self.close();
        self.auto_close = dataset.is_exclusive();
        self.dataset = Some(dataset);
        self.uri = Some(uri.to_string());
        Ok(())
    }

    pub fn dataset(&self) -> Option<Arc<dyn Dataset>> {
        self.dataset.clone()
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.dataset.is_some()
    }

    /// Release the dataset, clearing it when this connection owns it
    pub fn close(&mut self) {
        if let Some(dataset) = self.dataset.take() {
            if self.auto_close {
                dataset.clear();
            }
        }
        self.uri = None;
        self.auto_close = false;
    }
}

impl fmt::Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datasource")
            .field("uri", &self.uri)
            .field("connected", &self.dataset.is_some())
            .field("auto_close", &self.auto_close)
            .finish()
    }
}
