// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Knowledge Base
//!
//! Named, persistable model owned by a model-based algorithm.
//!
//! ```text
//! Empty ──learn/load──► Ready ──close──► Empty
//!   ▲                                     │
//!   └────────────── clear ◄───────────────┘ (deletes persisted artifacts)
//! ```
//!
//! The configuration is the owner's live bag (shared by reference) unless the
//! knowledge base was built through `new_kbase`, which hands it a clone.
//! Algorithm-specific state lives in a [`KBaseModel`]; this type owns the
//! lifecycle, persistence layout, datasource connection, and learn control.

use crate::domain::config::{
    DataConfig, SharedConfig, StoreUri, DATASOURCE_URI_FIELD, KBASE_NAME_FIELD, MAX_RATING_FIELD,
    MINMAX_RATING_RECONFIG_DEFAULT, MINMAX_RATING_RECONFIG_FIELD, MIN_RATING_FIELD,
};
use crate::domain::dataset::{Dataset, DatasetError, DatasetKind, DatasetResolver, Datasource};
use crate::domain::events::{ListenerList, SetupAlgEvent};
use crate::domain::learning::{LearnControl, LearnControlError, LearnRun};
use crate::domain::param::RecommendParam;
use crate::domain::rating::EntityId;
use crate::domain::storage::{KBaseStorage, StorageError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// Knowledge base errors
#[derive(Debug, Error)]
pub enum KBaseError {
    #[error("Knowledge base is not empty: {0}")]
    NotEmpty(String),

    #[error("Knowledge base is empty: {0}")]
    Empty(String),

    #[error("Knowledge base has no store location: {0}")]
    NoStore(String),

    #[error("Knowledge base not found at {0}")]
    NotFound(String),

    #[error("Knowledge base model error: {0}")]
    Model(String),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Config(#[from] crate::domain::config::ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Learn(#[from] LearnControlError),
}

impl From<StorageError> for KBaseError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileNotFound(uri) => KBaseError::NotFound(uri),
            other => KBaseError::Storage(other),
        }
    }
}

/// Where knowledge bases persist and how stored datasource URIs resolve.
///
/// Passed explicitly to every model-based algorithm.
#[derive(Clone)]
pub struct KBaseContext {
    pub storage: Arc<dyn KBaseStorage>,
    pub kb_root: StoreUri,
    /// Store every knowledge base of an algorithm in one fixed location
    /// instead of a fresh timestamped one
    pub fixed_store: bool,
    pub resolver: Option<Arc<dyn DatasetResolver>>,
}

impl KBaseContext {
    pub fn new(storage: Arc<dyn KBaseStorage>, kb_root: StoreUri) -> Self {
        Self {
            storage,
            kb_root,
            fixed_store: false,
            resolver: None,
        }
    }

    pub fn with_fixed_store(mut self, fixed_store: bool) -> Self {
        self.fixed_store = fixed_store;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DatasetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// `<kb_root>/<alg>/<timestamp millis>`, or `<kb_root>/<alg>` for a fixed store
    pub fn default_store_uri(&self, alg_name: &str) -> StoreUri {
        let base = self.kb_root.concat(alg_name);
        if self.fixed_store {
            base
        } else {
            base.concat(&Utc::now().timestamp_millis().to_string())
        }
    }
}

/// Progress reporting handle given to learn loops
pub struct LearnProgress {
    alg_name: String,
    dataset_uri: Option<String>,
    listeners: ListenerList,
}

impl LearnProgress {
    pub fn step(&self, progress_step: u64, progress_total: u64) {
        let event = SetupAlgEvent::doing(self.alg_name.clone(), progress_step, progress_total)
            .with_dataset_uri(self.dataset_uri.clone());
        self.listeners.fire(&event);
    }
}

/// Algorithm-specific knowledge
#[async_trait]
pub trait KBaseModel: Default + Send + Sync + 'static {
    /// Build the model from `dataset`.
    ///
    /// Long loops call `run.checkpoint()` between units of work and return
    /// early (keeping what was learned so far) when it yields `false`.
    async fn learn(
        &mut self,
        dataset: &dyn Dataset,
        config: &DataConfig,
        run: &mut LearnRun,
        progress: &LearnProgress,
    ) -> Result<(), KBaseError>;

    /// Natural candidate universe for ranking
    fn item_ids(&self) -> Vec<EntityId>;

    fn estimate(&self, param: &RecommendParam, item_id: EntityId, config: &DataConfig) -> Option<f64>;

    /// Serialized model, if the model has anything to persist
    fn to_payload(&self) -> Result<Option<Vec<u8>>, KBaseError> {
        Ok(None)
    }

    fn from_payload(&mut self, _bytes: &[u8]) -> Result<(), KBaseError> {
        Ok(())
    }
}

struct KBaseInner<M> {
    model: M,
    datasource: Datasource,
}

pub struct KnowledgeBase<M: KBaseModel> {
    name: String,
    alg_name: String,
    config: SharedConfig,
    context: KBaseContext,
    inner: RwLock<KBaseInner<M>>,
    empty: AtomicBool,
    learn_control: LearnControl,
    listeners: ListenerList,
}

impl<M: KBaseModel> KnowledgeBase<M> {
    pub fn new(
        name: impl Into<String>,
        alg_name: impl Into<String>,
        config: SharedConfig,
        context: KBaseContext,
        listeners: ListenerList,
    ) -> Self {
        Self {
            name: name.into(),
            alg_name: alg_name.into(),
            config,
            context,
            inner: RwLock::new(KBaseInner {
                model: M::default(),
                datasource: Datasource::new(),
            }),
            empty: AtomicBool::new(true),
            learn_control: LearnControl::new(),
            listeners,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> SharedConfig {
        Arc::clone(&self.config)
    }

    pub fn is_empty(&self) -> bool {
        self.empty.load(Ordering::SeqCst)
    }

    pub fn learn_control(&self) -> LearnControl {
        self.learn_control.clone()
    }

    /// Read access to the learned model
    pub async fn model(&self) -> RwLockReadGuard<'_, M> {
        RwLockReadGuard::map(self.inner.read().await, |inner| &inner.model)
    }

    /// Dataset the knowledge base is connected to, if any
    pub async fn datasource_dataset(&self) -> Option<Arc<dyn Dataset>> {
        self.inner.read().await.datasource.dataset()
    }

    fn config_uri(&self, store: &StoreUri) -> StoreUri {
        store.concat(&format!("{}_config.json", self.name))
    }

    fn model_uri(&self, store: &StoreUri) -> StoreUri {
        store.concat(&format!("{}_model.json", self.name))
    }

    fn store_uri(&self) -> Result<StoreUri, KBaseError> {
        self.config
            .read()
            .store_uri()
            .ok_or_else(|| KBaseError::NoStore(self.name.clone()))
    }

    /// Learn from `dataset`. Valid only while empty. A failed learn leaves
    /// the knowledge base empty with its datasource released.
    pub async fn learn(&self, dataset: Arc<dyn Dataset>) -> Result<(), KBaseError> {
        let mut inner = self.inner.write().await;
        if !self.is_empty() {
            return Err(KBaseError::NotEmpty(self.name.clone()));
        }

        let mut run = self.learn_control.begin()?;
        let learned = self.learn_locked(&mut inner, dataset, &mut run).await;
        drop(run);

        if let Err(e) = learned {
            self.reset_locked(&mut inner);
            warn!(kbase = %self.name, alg = %self.alg_name, error = %e, "Knowledge base learn failed");
            return Err(e);
        }

        self.empty.store(false, Ordering::SeqCst);
        info!(kbase = %self.name, alg = %self.alg_name, "Knowledge base learned");
        Ok(())
    }

    async fn learn_locked(
        &self,
        inner: &mut KBaseInner<M>,
        dataset: Arc<dyn Dataset>,
        run: &mut LearnRun,
    ) -> Result<(), KBaseError> {
        let metadata = dataset.metadata();
        let snapshot = {
            let mut config = self.config.write();
            config.set_metadata(metadata);
            config.put_unchecked(KBASE_NAME_FIELD, self.name.clone());
            config.add_read_only(MIN_RATING_FIELD);
            config.add_read_only(MAX_RATING_FIELD);
            config.add_read_only(KBASE_NAME_FIELD);
            config.clone()
        };

        inner.datasource.close();
        if dataset.kind() == DatasetKind::Regular {
            inner.datasource.connect(Arc::clone(&dataset));
            if let Some(uri) = inner.datasource.uri() {
                self.config.write().put_unchecked(DATASOURCE_URI_FIELD, uri.to_string());
            }
        }

        let snapshot = if snapshot
            .get_as_bool(MINMAX_RATING_RECONFIG_FIELD)
            .unwrap_or(MINMAX_RATING_RECONFIG_DEFAULT)
        {
            self.reconfig_min_max(dataset.as_ref());
            self.config.read().clone()
        } else {
            snapshot
        };

        let progress = LearnProgress {
            alg_name: self.alg_name.clone(),
            dataset_uri: dataset.uri(),
            listeners: self.listeners.clone(),
        };
        inner
            .model
            .learn(dataset.as_ref(), &snapshot, run, &progress)
            .await
    }

    /// Drop the model, the datasource and the learned identity keys
    fn reset_locked(&self, inner: &mut KBaseInner<M>) {
        inner.datasource.close();
        inner.model = M::default();
        let mut config = self.config.write();
        config.clear_metadata();
        config.remove_unchecked(KBASE_NAME_FIELD);
        config.remove_unchecked(DATASOURCE_URI_FIELD);
    }

    /// Recompute the true rating bounds and overwrite both configurations
    /// when they differ from the declared ones
    fn reconfig_min_max(&self, dataset: &dyn Dataset) {
        let (min, max) = dataset
            .fetch_user_ratings()
            .flat_map(|vector| vector.iter().map(|(_, r)| r).collect::<Vec<_>>())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(r), hi.max(r)));
        if !min.is_finite() || !max.is_finite() {
            return;
        }

        let mut config = self.config.write();
        if config.min_rating() == Some(min) && config.max_rating() == Some(max) {
            return;
        }
        config.put_unchecked(MIN_RATING_FIELD, min);
        config.put_unchecked(MAX_RATING_FIELD, max);
        drop(config);

        let dataset_config = dataset.config();
        let mut dataset_config = dataset_config.write();
        dataset_config.put_unchecked(MIN_RATING_FIELD, min);
        dataset_config.put_unchecked(MAX_RATING_FIELD, max);
        debug!(kbase = %self.name, min, max, "Rating bounds reconfigured from data");
    }

    /// Load from the configured store. Valid only while empty.
    pub async fn load(&self) -> Result<(), KBaseError> {
        let mut inner = self.inner.write().await;
        if !self.is_empty() {
            return Err(KBaseError::NotEmpty(self.name.clone()));
        }

        let store = self.store_uri()?;
        let bytes = self.context.storage.read(&self.config_uri(&store)).await?;
        let stored = DataConfig::from_json(&bytes)?;

        let model_uri = self.model_uri(&store);
        if self.context.storage.exists(&model_uri).await? {
            let payload = self.context.storage.read(&model_uri).await?;
            inner.model.from_payload(&payload)?;
        }

        let datasource_uri = {
            let mut config = self.config.write();
            config.put_all_unchecked(&stored);
            config.set_store_uri(&store);
            config.get_as_str(DATASOURCE_URI_FIELD).map(str::to_string)
        };

        inner.datasource.close();
        if let (Some(uri), Some(resolver)) = (datasource_uri, self.context.resolver.as_ref()) {
            if let Err(e) = inner.datasource.connect_uri(&uri, resolver.as_ref()) {
                warn!(kbase = %self.name, uri = %uri, error = %e, "Could not reconnect datasource");
            }
        }

        self.empty.store(false, Ordering::SeqCst);
        info!(kbase = %self.name, store = %store, "Knowledge base loaded");
        Ok(())
    }

    /// Persist to `store`, replacing artifacts of this knowledge base there.
    /// In-memory state is unchanged.
    pub async fn save(&self, store: &StoreUri) -> Result<(), KBaseError> {
        let inner = self.inner.read().await;
        if self.is_empty() {
            return Err(KBaseError::Empty(self.name.clone()));
        }

        let storage = &self.context.storage;
        storage.clear_content(store, &self.name).await?;
        storage.create_dir(store).await?;

        let config_bytes = self.config.read().to_json()?;
        storage.write(&self.config_uri(store), &config_bytes).await?;
        if let Some(payload) = inner.model.to_payload()? {
            storage.write(&self.model_uri(store), &payload).await?;
        }

        info!(kbase = %self.name, store = %store, "Knowledge base saved");
        Ok(())
    }

    /// Persist to the store named by the configuration
    pub async fn save_to_store(&self) -> Result<(), KBaseError> {
        let store = self.store_uri()?;
        self.save(&store).await
    }

    /// Release the datasource and return to empty. Persisted artifacts stay.
    pub async fn close(&self) {
        let mut inner = self.inner.write().await;
        self.reset_locked(&mut inner);
        if !self.empty.swap(true, Ordering::SeqCst) {
            debug!(kbase = %self.name, "Knowledge base closed");
        }
    }

    /// Delete persisted artifacts, then close
    pub async fn clear(&self) -> Result<(), KBaseError> {
        let store = self.config.read().store_uri();
        if let Some(store) = store {
            let removed = self.context.storage.clear_content(&store, &self.name).await?;
            debug!(kbase = %self.name, store = %store, removed, "Knowledge base artifacts cleared");
        }
        self.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rating::RatingVector;
    use crate::infrastructure::dataset::MemDataset;
    use crate::infrastructure::storage::InMemoryKBaseStorage;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Default, Serialize, Deserialize)]
    struct CountModel {
        counts: BTreeMap<EntityId, usize>,
    }

    #[async_trait]
    impl KBaseModel for CountModel {
        async fn learn(
            &mut self,
            dataset: &dyn Dataset,
            _config: &DataConfig,
            run: &mut LearnRun,
            _progress: &LearnProgress,
        ) -> Result<(), KBaseError> {
            for item in dataset.fetch_item_ratings() {
                if !run.checkpoint().await {
                    break;
                }
                self.counts.insert(item.id(), item.len());
            }
            Ok(())
        }

        fn item_ids(&self) -> Vec<EntityId> {
            self.counts.keys().copied().collect()
        }

        fn estimate(&self, _param: &RecommendParam, item_id: EntityId, _config: &DataConfig) -> Option<f64> {
            self.counts.get(&item_id).map(|c| *c as f64)
        }

        fn to_payload(&self) -> Result<Option<Vec<u8>>, KBaseError> {
            serde_json::to_vec(self)
                .map(Some)
                .map_err(|e| KBaseError::Model(e.to_string()))
        }

        fn from_payload(&mut self, bytes: &[u8]) -> Result<(), KBaseError> {
            *self = serde_json::from_slice(bytes).map_err(|e| KBaseError::Model(e.to_string()))?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingModel {
        seen: usize,
    }

    #[async_trait]
    impl KBaseModel for FailingModel {
        async fn learn(
            &mut self,
            dataset: &dyn Dataset,
            _config: &DataConfig,
            _run: &mut LearnRun,
            _progress: &LearnProgress,
        ) -> Result<(), KBaseError> {
            self.seen = dataset.fetch_item_ids().count();
            Err(KBaseError::Model("out of memory".to_string()))
        }

        fn item_ids(&self) -> Vec<EntityId> {
            Vec::new()
        }

        fn estimate(&self, _param: &RecommendParam, _item_id: EntityId, _config: &DataConfig) -> Option<f64> {
            None
        }
    }

    fn context() -> KBaseContext {
        KBaseContext::new(Arc::new(InMemoryKBaseStorage::new()), StoreUri::new("kb"))
    }

    fn kbase(context: &KBaseContext) -> KnowledgeBase<CountModel> {
        let mut config = DataConfig::new();
        config.set_store_uri(&StoreUri::new("kb/count/1"));
        KnowledgeBase::new("count", "count_alg", config.shared(), context.clone(), ListenerList::new())
    }

    fn dataset() -> Arc<dyn Dataset> {
        Arc::new(
            MemDataset::new(1.0, 5.0)
                .with_uri("mem://ratings")
                .with_user_rating(RatingVector::with_ratings(1, [(10, 4.0), (11, 2.0)]))
                .with_user_rating(RatingVector::with_ratings(2, [(10, 5.0)])),
        )
    }

    #[tokio::test]
    async fn test_learn_marks_keys_and_connects_datasource() {
        let kb = kbase(&context());
        assert!(kb.is_empty());

        kb.learn(dataset()).await.unwrap();
        assert!(!kb.is_empty());

        let config = kb.config();
        let config = config.read();
        assert!(config.is_read_only(MIN_RATING_FIELD));
        assert!(config.is_read_only(MAX_RATING_FIELD));
        assert!(config.is_read_only(KBASE_NAME_FIELD));
        assert_eq!(config.get_as_str(KBASE_NAME_FIELD), Some("count"));
        assert_eq!(config.get_as_str(DATASOURCE_URI_FIELD), Some("mem://ratings"));
    }

    #[tokio::test]
    async fn test_learn_twice_is_rejected() {
        let kb = kbase(&context());
        kb.learn(dataset()).await.unwrap();
        assert!(matches!(kb.learn(dataset()).await, Err(KBaseError::NotEmpty(_))));
    }

    #[tokio::test]
    async fn test_close_strips_keys_but_keeps_marks() {
        let kb = kbase(&context());
        kb.learn(dataset()).await.unwrap();
        kb.close().await;

        assert!(kb.is_empty());
        let config = kb.config();
        let config = config.read();
        assert!(config.get(KBASE_NAME_FIELD).is_none());
        assert!(config.get(DATASOURCE_URI_FIELD).is_none());
        assert!(config.is_read_only(MIN_RATING_FIELD));
    }

    #[tokio::test]
    async fn test_save_load_round_trip_on_fresh_instance() {
        let context = context();
        let kb = kbase(&context);
        kb.learn(dataset()).await.unwrap();
        kb.save_to_store().await.unwrap();

        let fresh = kbase(&context);
        fresh.load().await.unwrap();
        assert!(!fresh.is_empty());
        assert_eq!(fresh.model().await.counts.get(&10), Some(&2));
        assert_eq!(
            fresh.config().read().get_as_str(KBASE_NAME_FIELD),
            Some("count")
        );
    }

    #[tokio::test]
    async fn test_clear_then_load_fails() {
        let context = context();
        let kb = kbase(&context);
        kb.learn(dataset()).await.unwrap();
        kb.save_to_store().await.unwrap();
        kb.clear().await.unwrap();

        assert!(kb.is_empty());
        assert!(matches!(kb.load().await, Err(KBaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pointer_dataset_does_not_connect() {
        let kb = kbase(&context());
        let pointer: Arc<dyn Dataset> =
            Arc::new(crate::domain::dataset::DatasetPointer::new(DataConfig::new()));
        kb.learn(pointer).await.unwrap();

        assert!(kb.datasource_dataset().await.is_none());
        assert!(kb.config().read().get(DATASOURCE_URI_FIELD).is_none());
    }

    #[tokio::test]
    async fn test_minmax_reconfig_overwrites_both_configs() {
        let kb = kbase(&context());
        kb.config().write().put(MINMAX_RATING_RECONFIG_FIELD, true).unwrap();
        let data = Arc::new(
            MemDataset::new(0.0, 10.0)
                .with_user_rating(RatingVector::with_ratings(1, [(10, 2.0), (11, 4.0)])),
        );

        kb.learn(data.clone()).await.unwrap();
        assert_eq!(kb.config().read().max_rating(), Some(4.0));
        assert_eq!(data.config().read().min_rating(), Some(2.0));
    }

    #[tokio::test]
    async fn test_failed_learn_releases_datasource_and_identity_keys() {
        let mut config = DataConfig::new();
        config.set_store_uri(&StoreUri::new("kb/failing/1"));
        let kb: KnowledgeBase<FailingModel> =
            KnowledgeBase::new("failing", "failing_alg", config.shared(), context(), ListenerList::new());

        let result = kb.learn(dataset()).await;
        assert!(matches!(result, Err(KBaseError::Model(_))));

        assert!(kb.is_empty());
        assert!(kb.datasource_dataset().await.is_none());
        assert_eq!(kb.model().await.seen, 0);
        assert_eq!(kb.learn_control().state(), crate::domain::learning::LearnState::Stopped);
        let config = kb.config();
        let config = config.read();
        assert!(config.get(KBASE_NAME_FIELD).is_none());
        assert!(config.get(DATASOURCE_URI_FIELD).is_none());
        assert!(config.metadata().is_none());
    }
}
