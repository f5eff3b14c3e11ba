// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Model-based recommenders
//!
//! Own a [`KnowledgeBase`] that shares the recommender's live configuration.
//! Setup dispatches on the dataset kind:
//!
//! | Dataset | Setup |
//! |---------|-------|
//! | regular | learn, then save to the configured store |
//! | KB pointer | load from the pointer's store (or the configured one); the pointer's config receives the KB config |
//! | plain pointer | nothing |

use crate::application::base::{recommender_defaults, RecommenderBase};
use crate::domain::alg::{Alg, AlgError, AlgKind};
use crate::domain::config::{DataConfig, SharedConfig};
use crate::domain::dataset::{Dataset, DatasetKind};
use crate::domain::events::{EventListener, ListenerList};
use crate::domain::filter::{RecommendFilter, RecommendFilterList};
use crate::domain::kbase::{KBaseContext, KBaseModel, KnowledgeBase};
use crate::domain::learning::LearnControl;
use crate::domain::param::RecommendParam;
use crate::domain::ranking::{
    rank, recommend_preprocess, select_candidates, to_recommend_list, RankingOptions, RecommendList,
};
use crate::domain::rating::{EntityId, RatingVector};
use crate::domain::recommender::Recommender;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Knowledge model plus the identity of the algorithm built on it
pub trait ModelAlgorithm: KBaseModel {
    const NAME: &'static str;

    fn default_config() -> DataConfig {
        recommender_defaults()
    }
}

pub struct ModelBasedRecommender<M: ModelAlgorithm> {
    base: RecommenderBase,
    context: KBaseContext,
    kb: KnowledgeBase<M>,
}

impl<M: ModelAlgorithm> ModelBasedRecommender<M> {
    pub fn new(context: KBaseContext) -> Self {
        let config = Self::defaults(&context).shared();
        let base = RecommenderBase::new(M::NAME, AlgKind::ModelBased, Arc::clone(&config));
        let kb = KnowledgeBase::new(
            M::NAME,
            M::NAME,
            config,
            context.clone(),
            base.listeners().clone(),
        );
        Self { base, context, kb }
    }

    fn defaults(context: &KBaseContext) -> DataConfig {
        let mut config = M::default_config();
        config.set_store_uri(&context.default_store_uri(M::NAME));
        config
    }

    pub fn kbase(&self) -> &KnowledgeBase<M> {
        &self.kb
    }

    /// Build an independent knowledge base on a clone of the configuration.
    /// The recommender's own knowledge base is untouched.
    pub async fn new_kbase(&self, dataset: Arc<dyn Dataset>) -> Result<KnowledgeBase<M>, AlgError> {
        let config = self.base.config().read().clone();
        let kb = KnowledgeBase::new(
            M::NAME,
            M::NAME,
            config.shared(),
            self.context.clone(),
            ListenerList::new(),
        );

        match dataset.kind() {
            DatasetKind::KBasePointer => {
                let store = dataset.config().read().store_uri();
                if let Some(store) = store {
                    kb.config().write().set_store_uri(&store);
                }
                kb.load().await?;
            }
            DatasetKind::Pointer => {}
            DatasetKind::Regular => kb.learn(dataset).await?,
        }
        Ok(kb)
    }

    async fn unsetup_locked(&self) {
        self.base.release();
        self.kb.close().await;
    }

    async fn setup_locked(&self, dataset: Arc<dyn Dataset>) -> Result<(), AlgError> {
        self.base.set_dataset(Arc::clone(&dataset));
        match dataset.kind() {
            DatasetKind::KBasePointer => {
                let store = dataset.config().read().store_uri();
                if let Some(store) = store {
                    self.base.config().write().set_store_uri(&store);
                }
                self.kb.load().await?;
                let kb_config = self.kb.config().read().clone();
                dataset.config().write().put_all(&kb_config);
                info!(alg = M::NAME, "Knowledge base loaded from pointer");
            }
            DatasetKind::Pointer => {
                debug!(alg = M::NAME, "Setup on plain pointer, nothing to learn");
            }
            DatasetKind::Regular => {
                self.kb.learn(dataset).await?;
                self.kb.save_to_store().await?;
            }
        }
        Ok(())
    }

    /// Dataset to complete query params from: the knowledge base's datasource
    /// first, then the setup dataset
    async fn query_dataset(&self) -> Option<Arc<dyn Dataset>> {
        match self.kb.datasource_dataset().await {
            Some(dataset) => Some(dataset),
            None => self.base.dataset(),
        }
    }
}

impl<M: ModelAlgorithm> Alg for ModelBasedRecommender<M> {
    fn name(&self) -> String {
        M::NAME.to_string()
    }

    fn kind(&self) -> AlgKind {
        AlgKind::ModelBased
    }

    fn config(&self) -> SharedConfig {
        self.base.config()
    }

    fn create_default_config(&self) -> DataConfig {
        Self::defaults(&self.context)
    }
}

#[async_trait]
impl<M: ModelAlgorithm> Recommender for ModelBasedRecommender<M> {
    async fn setup(&self, dataset: Arc<dyn Dataset>) -> Result<(), AlgError> {
        let _gate = self.base.gate.write().await;
        self.unsetup_locked().await;
        if let Err(e) = self.setup_locked(dataset).await {
            warn!(alg = M::NAME, error = %e, "Setup failed, rolling back");
            self.unsetup_locked().await;
            return Err(e);
        }

        let store = self.base.config().read().store_uri().map(|s| s.to_string());
        self.base.fire_setup_done(store.map(serde_json::Value::String));
        Ok(())
    }

    async fn unsetup(&self) -> Result<(), AlgError> {
        let _gate = self.base.gate.write().await;
        self.unsetup_locked().await;
        debug!(alg = M::NAME, "Unsetup");
        Ok(())
    }

    async fn estimate(
        &self,
        param: &RecommendParam,
        item_ids: &[EntityId],
    ) -> Result<Option<RatingVector>, AlgError> {
        let _gate = self.base.gate.read().await;
        self.base.count_estimate();
        if self.kb.is_empty() {
            return Ok(None);
        }
        let dataset = self.query_dataset().await;
        let Some(param) = recommend_preprocess(param, dataset.as_deref()) else {
            return Ok(None);
        };
        let config = self.base.config().read().clone();
        let model = self.kb.model().await;

        let mut result = RatingVector::new(param.user_id());
        for &item_id in item_ids {
            if let Some(value) = model
                .estimate(&param, item_id, &config)
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
        if self.kb.is_empty() {
            return Ok(None);
        }
        let dataset = self.query_dataset().await;
        let Some(mut param) = recommend_preprocess(param, dataset.as_deref()) else {
            return Ok(None);
        };

        let filters = self.base.filter_list();
        filters.prepare(&mut param);
        let config = self.base.config().read().clone();
        let model = self.kb.model().await;

        let candidates = select_candidates(&param, model.item_ids(), &filters, dataset.as_deref());
        let options = RankingOptions::from_config(&config, max_recommend);
        let pairs = rank(candidates, &options, |item_id| model.estimate(&param, item_id, &config));
        Ok(to_recommend_list(param.user_id(), pairs))
    }

    async fn new_instance(&self) -> Result<Arc<dyn Recommender>, AlgError> {
        Ok(Arc::new(Self::new(self.context.clone())))
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

    fn learn_control(&self) -> Option<LearnControl> {
        Some(self.kb.learn_control())
    }
}
