// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Composite recommender: averages the estimates of an ordered list of inner
//! recommenders. Setup and unsetup cascade to every inner recommender; each
//! inner store location is derived from the composite's (`<store>/<inner>`).

use crate::application::base::{recommender_defaults, RecommenderBase};
use crate::domain::alg::{Alg, AlgError, AlgKind};
use crate::domain::config::{DataConfig, SharedConfig};
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
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct CompositeRecommender {
    base: RecommenderBase,
    inner: Vec<Arc<dyn Recommender>>,
}

impl CompositeRecommender {
    pub fn new(name: impl Into<String>, inner: Vec<Arc<dyn Recommender>>) -> Self {
        Self {
            base: RecommenderBase::new(name, AlgKind::Composite, recommender_defaults().shared()),
            inner,
        }
    }

    pub fn inner(&self) -> &[Arc<dyn Recommender>] {
        &self.inner
    }

    async fn unsetup_locked(&self) {
        for inner in &self.inner {
            if let Err(e) = inner.unsetup().await {
                warn!(alg = %self.base.name(), inner = %inner.name(), error = %e, "Inner unsetup failed");
            }
        }
        self.base.release();
    }

    async fn setup_locked(&self, dataset: Arc<dyn Dataset>) -> Result<(), AlgError> {
        self.base.set_dataset(Arc::clone(&dataset));
        let store = self.base.config().read().store_uri();
        for inner in &self.inner {
            if let Some(store) = &store {
                inner.config().write().set_store_uri(&store.concat(&inner.name()));
            }
            inner.setup(Arc::clone(&dataset)).await?;
        }
        self.base.config().write().set_metadata(dataset.metadata());
        Ok(())
    }

    /// Mean of the available inner estimates per item. Inner recommenders are
    /// queried concurrently.
    async fn average_estimates(
        &self,
        param: &RecommendParam,
        item_ids: &[EntityId],
    ) -> Result<BTreeMap<EntityId, f64>, AlgError> {
        let all = try_join_all(
            self.inner
                .iter()
                .map(|inner| inner.estimate(param, item_ids)),
        )
        .await?;

        let mut sums: BTreeMap<EntityId, (f64, usize)> = BTreeMap::new();
        for estimates in all.iter().flatten() {
            for (item_id, value) in estimates.iter() {
                let entry = sums.entry(item_id).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        Ok(sums
            .into_iter()
            .map(|(item_id, (sum, count))| (item_id, sum / count as f64))
            .collect())
    }

    /// Dataset the candidate universe comes from
    fn candidate_dataset(&self) -> Option<Arc<dyn Dataset>> {
        self.inner
            .first()
            .and_then(|inner| inner.dataset())
            .or_else(|| self.base.dataset())
    }
}

impl Alg for CompositeRecommender {
    fn name(&self) -> String {
        self.base.name().to_string()
    }

    fn kind(&self) -> AlgKind {
        AlgKind::Composite
    }

    fn config(&self) -> SharedConfig {
        self.base.config()
    }

    fn create_default_config(&self) -> DataConfig {
        recommender_defaults()
    }
}

#[async_trait]
impl Recommender for CompositeRecommender {
    async fn setup(&self, dataset: Arc<dyn Dataset>) -> Result<(), AlgError> {
        let _gate = self.base.gate.write().await;
        self.unsetup_locked().await;
        if let Err(e) = self.setup_locked(dataset).await {
            warn!(alg = %self.base.name(), error = %e, "Setup failed, rolling back");
            self.unsetup_locked().await;
            return Err(e);
        }

        self.base.fire_setup_done(None);
        Ok(())
    }

    async fn unsetup(&self) -> Result<(), AlgError> {
        let _gate = self.base.gate.write().await;
        self.unsetup_locked().await;
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
        let averaged = self.average_estimates(param, item_ids).await?;
        if averaged.is_empty() {
            return Ok(None);
        }
        Ok(Some(RatingVector::with_ratings(param.user_id(), averaged)))
    }

    async fn recommend(
        &self,
        param: &RecommendParam,
        max_recommend: i32,
    ) -> Result<Option<RecommendList>, AlgError> {
        let _gate = self.base.gate.read().await;
        self.base.count_recommend();
        let Some(dataset) = self.candidate_dataset() else {
            return Err(AlgError::NotSetup(self.base.name().to_string()));
        };
        let Some(mut param) = recommend_preprocess(param, Some(dataset.as_ref())) else {
            return Ok(None);
        };

        let filters = self.base.filter_list();
        filters.prepare(&mut param);
        let config = self.base.config().read().clone();

        let candidates = select_candidates(
            &param,
            dataset.fetch_item_ids(),
            &filters,
            Some(dataset.as_ref()),
        );
        let estimates = self.average_estimates(&param, &candidates).await?;
        let options = RankingOptions::from_config(&config, max_recommend);
        let pairs = rank(candidates, &options, |item_id| estimates.get(&item_id).copied());
        Ok(to_recommend_list(param.user_id(), pairs))
    }

    async fn new_instance(&self) -> Result<Arc<dyn Recommender>, AlgError> {
        let mut inner = Vec::with_capacity(self.inner.len());
        for recommender in &self.inner {
            inner.push(recommender.new_instance().await?);
        }
        Ok(Arc::new(Self::new(self.base.name(), inner)))
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
