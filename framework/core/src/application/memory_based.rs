// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Memory-based recommenders
//!
//! Estimate directly from the dataset at query time; there is no knowledge
//! base. A concrete algorithm supplies a [`MemoryEstimator`] and
//! [`MemoryBasedRecommender`] provides setup, locking, filtering and ranking.

use crate::application::base::RecommenderBase;
use crate::domain::alg::{Alg, AlgError, AlgKind};
use crate::domain::config::{DataConfig, SharedConfig, MAX_RATING_FIELD, MIN_RATING_FIELD};
use crate::domain::dataset::Dataset;
use crate::domain::events::EventListener;
use crate::domain::filter::{RecommendFilter, RecommendFilterList};
use crate::domain::param::RecommendParam;
use crate::domain::ranking::{
    rank, recommend_preprocess, select_candidates, to_recommend_list, RankingOptions, RecommendList,
};
use crate::domain::rating::{EntityId, RatingVector};
use crate::domain::recommender::Recommender;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Query-time estimation logic of a memory-based algorithm
pub trait MemoryEstimator: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn default_config(&self) -> DataConfig;

    /// Fresh estimator with no per-setup state
    fn fresh(&self) -> Self
    where
        Self: Sized;

    fn on_setup(&self, _dataset: &dyn Dataset, _config: &DataConfig) {}

    fn on_unsetup(&self) {}

    fn estimate(
        &self,
        dataset: &dyn Dataset,
        config: &DataConfig,
        param: &RecommendParam,
        item_id: EntityId,
    ) -> Option<f64>;

    /// Candidate universe, items of the dataset by default
    fn candidates(&self, dataset: &dyn Dataset) -> Vec<EntityId> {
        dataset.fetch_item_ids().collect()
    }
}

pub struct MemoryBasedRecommender<E: MemoryEstimator> {
    base: RecommenderBase,
    estimator: E,
}

impl<E: MemoryEstimator> MemoryBasedRecommender<E> {
    pub fn new(estimator: E) -> Self {
        let config = estimator.default_config().shared();
        Self {
            base: RecommenderBase::new(estimator.name(), AlgKind::MemoryBased, config),
            estimator,
        }
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    fn unsetup_locked(&self) {
        self.estimator.on_unsetup();
        {
            let config = self.base.config();
            let mut config = config.write();
            config.clear_metadata();
            config.remove_read_only(MIN_RATING_FIELD);
            config.remove_read_only(MAX_RATING_FIELD);
        }
        self.base.release();
    }

    fn require_dataset(&self) -> Result<Arc<dyn Dataset>, AlgError> {
        self.base
            .dataset()
            .ok_or_else(|| AlgError::NotSetup(self.base.name().to_string()))
    }
}

impl<E: MemoryEstimator> Alg for MemoryBasedRecommender<E> {
    fn name(&self) -> String {
        self.base.name().to_string()
    }

    fn kind(&self) -> AlgKind {
        AlgKind::MemoryBased
    }

    fn config(&self) -> SharedConfig {
        self.base.config()
    }

    fn create_default_config(&self) -> DataConfig {
        self.estimator.default_config()
    }
}

#[async_trait]
impl<E: MemoryEstimator> Recommender for MemoryBasedRecommender<E> {
    async fn setup(&self, dataset: Arc<dyn Dataset>) -> Result<(), AlgError> {
        let _gate = self.base.gate.write().await;
        self.unsetup_locked();

        if dataset.kind().is_pointer() {
            return Err(AlgError::InvalidDataset(format!(
                "{} needs rating data, got a {:?} dataset",
                self.base.name(),
                dataset.kind()
            )));
        }

        self.base.set_dataset(Arc::clone(&dataset));
        let snapshot = {
            let config = self.base.config();
            let mut config = config.write();
            config.set_metadata(dataset.metadata());
            config.add_read_only(MIN_RATING_FIELD);
            config.add_read_only(MAX_RATING_FIELD);
            config.clone()
        };
        self.estimator.on_setup(dataset.as_ref(), &snapshot);

        self.base.fire_setup_done(None);
        Ok(())
    }

    async fn unsetup(&self) -> Result<(), AlgError> {
        let _gate = self.base.gate.write().await;
        self.unsetup_locked();
        debug!(alg = %self.base.name(), "Unsetup");
        Ok(())
    }

    async fn estimate(
        &self,
        param: &RecommendParam,
        item_ids: &[EntityId],
    ) -> Result<Option<RatingVector>, AlgError> {
        let _gate = self.base.gate.read().await;
        self.base.count_estimate();
        let dataset = self.require_dataset()?;
        let Some(param) = recommend_preprocess(param, Some(dataset.as_ref())) else {
            return Ok(None);
        };
        let config = self.base.config().read().clone();

        let mut result = RatingVector::new(param.user_id());
        for &item_id in item_ids {
            if let Some(value) = self
                .estimator
                .estimate(dataset.as_ref(), &config, &param, item_id)
                .filter(|v| v.is_finite())
            {
                result.put(item_id, value);
            }
        }
        Ok((!result.is_empty()).then_some(result))
    }

    async fn recommend(
        &self,
        param: &RecommendParam,
        max_recommend: i32,
    ) -> Result<Option<RecommendList>, AlgError> {
        let _gate = self.base.gate.read().await;
        self.base.count_recommend();
        let dataset = self.require_dataset()?;
        let Some(mut param) = recommend_preprocess(param, Some(dataset.as_ref())) else {
            return Ok(None);
        };

        let filters = self.base.filter_list();
        filters.prepare(&mut param);
        let config = self.base.config().read().clone();

        let candidates = select_candidates(
            &param,
            self.estimator.candidates(dataset.as_ref()),
            &filters,
            Some(dataset.as_ref()),
        );
        let options = RankingOptions::from_config(&config, max_recommend);
        let pairs = rank(candidates, &options, |item_id| {
            self.estimator.estimate(dataset.as_ref(), &config, &param, item_id)
        });
        Ok(to_recommend_list(param.user_id(), pairs))
    }

    async fn new_instance(&self) -> Result<Arc<dyn Recommender>, AlgError> {
        Ok(Arc::new(Self::new(self.estimator.fresh())))
    }

    fn filter_list(&self) -> Result<RecommendFilterList, AlgError> {
        Ok(self.base.filter_list())
    }

    fn add_filter(&self, filter: Arc<dyn RecommendFilter>) -> Result<(), AlgError> {
        self.base.add_filter(filter);
        Ok(())
    }

    fn dataset(&self) -> Option<Arc<dyn Dataset>> {
        self.base.dataset()
    }

    fn add_setup_listener(&self, listener: Arc<dyn EventListener>) {
        self.base.add_setup_listener(listener);
    }
}
