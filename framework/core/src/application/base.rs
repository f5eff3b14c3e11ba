// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! State shared by every local recommender: identity, live config, the setup
//! gate, the current dataset, the filter pipeline and setup listeners.

use crate::domain::alg::AlgKind;
use crate::domain::config::{
    DataConfig, SharedConfig, DUPLICATABLE_FIELD, FAST_RECOMMEND_FIELD, RESERVED_RECOMMEND_FIELD,
    SUPPORT_CACHE_DEFAULT, SUPPORT_CACHE_FIELD,
};
use crate::domain::dataset::Dataset;
use crate::domain::events::{EventListener, ListenerList, SetupAlgEvent};
use crate::domain::filter::{RecommendFilter, RecommendFilterList};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock as AsyncRwLock;
use tracing::debug;

/// Defaults every recommender configuration starts from
pub fn recommender_defaults() -> DataConfig {
    let mut config = DataConfig::new();
    config.put_unchecked(SUPPORT_CACHE_FIELD, SUPPORT_CACHE_DEFAULT);
    config.put_unchecked(FAST_RECOMMEND_FIELD, false);
    config.put_unchecked(RESERVED_RECOMMEND_FIELD, false);
    config.put_unchecked(DUPLICATABLE_FIELD, false);
    config
}

pub struct RecommenderBase {
    name: String,
    kind: AlgKind,
    config: SharedConfig,
    /// `setup`/`unsetup` take it for writing, ranking calls for reading
    pub(crate) gate: AsyncRwLock<()>,
    dataset: RwLock<Option<Arc<dyn Dataset>>>,
    filters: RwLock<RecommendFilterList>,
    listeners: ListenerList,
}

impl RecommenderBase {
    pub fn new(name: impl Into<String>, kind: AlgKind, config: SharedConfig) -> Self {
        Self {
            name: name.into(),
            kind,
            config,
            gate: AsyncRwLock::new(()),
            dataset: RwLock::new(None),
            filters: RwLock::new(RecommendFilterList::new()),
            listeners: ListenerList::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AlgKind {
        self.kind
    }

    pub fn config(&self) -> SharedConfig {
        Arc::clone(&self.config)
    }

    pub fn dataset(&self) -> Option<Arc<dyn Dataset>> {
        self.dataset.read().clone()
    }

    pub fn set_dataset(&self, dataset: Arc<dyn Dataset>) {
        *self.dataset.write() = Some(dataset);
    }

    pub fn filter_list(&self) -> RecommendFilterList {
        self.filters.read().clone()
    }

    pub fn add_filter(&self, filter: Arc<dyn RecommendFilter>) {
        self.filters.write().add(filter);
    }

    pub fn listeners(&self) -> &ListenerList {
        &self.listeners
    }

    pub fn add_setup_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.add(listener);
    }

    /// Common teardown: drop filters and release the dataset, clearing it
    /// when it is exclusive
    pub fn release(&self) {
        self.filters.write().clear();
        if let Some(dataset) = self.dataset.write().take() {
            if dataset.is_exclusive() {
                dataset.clear();
            }
        }
    }

    pub fn fire_setup_done(&self, result: Option<Value>) {
        let dataset_uri = self.dataset().and_then(|d| d.uri());
        metrics::counter!("recforge_setup_total", "algorithm" => self.name.clone()).increment(1);
        let event = SetupAlgEvent::done(self.name.clone(), result).with_dataset_uri(dataset_uri);
        self.listeners.fire(&event);
        debug!(alg = %self.name, "Setup done");
    }

    pub fn count_recommend(&self) {
        metrics::counter!("recforge_recommend_requests_total", "algorithm" => self.name.clone())
            .increment(1);
    }

    pub fn count_estimate(&self) {
        metrics::counter!("recforge_estimate_requests_total", "algorithm" => self.name.clone())
            .increment(1);
    }
}
