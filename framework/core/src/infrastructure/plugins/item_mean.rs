// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Item mean model
//!
//! The knowledge base stores the mean rating of every item. Learning walks the
//! item vectors one by one through the cooperative learn loop, so it can be
//! paused, resumed and stopped; `learn_step_delay_ms` slows each step down.

use crate::application::base::recommender_defaults;
use crate::application::model_based::ModelAlgorithm;
use crate::domain::config::DataConfig;
use crate::domain::dataset::Dataset;
use crate::domain::kbase::{KBaseError, KBaseModel, LearnProgress};
use crate::domain::learning::LearnRun;
use crate::domain::param::RecommendParam;
use crate::domain::rating::{EntityId, RatingVector};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const ITEM_MEAN_NAME: &str = "item_mean";
pub const LEARN_STEP_DELAY_FIELD: &str = "learn_step_delay_ms";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMean {
    means: BTreeMap<EntityId, f64>,
}

impl ItemMean {
    pub fn mean(&self, item_id: EntityId) -> Option<f64> {
        self.means.get(&item_id).copied()
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

#[async_trait]
impl KBaseModel for ItemMean {
    async fn learn(
        &mut self,
        dataset: &dyn Dataset,
        config: &DataConfig,
        run: &mut LearnRun,
        progress: &LearnProgress,
    ) -> Result<(), KBaseError> {
        let delay = config
            .get_as_i64(LEARN_STEP_DELAY_FIELD)
            .and_then(|ms| u64::try_from(ms).ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let items: Vec<RatingVector> = dataset.fetch_item_ratings().collect();
        let total = items.len() as u64;
        self.means.clear();

        for (step, item) in items.iter().enumerate() {
            if !run.checkpoint().await {
                debug!(learned = self.means.len(), total, "Item mean learning stopped early");
                break;
            }
            if let Some(mean) = item.mean() {
                self.means.insert(item.id(), mean);
            }
            progress.step(step as u64 + 1, total);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    fn item_ids(&self) -> Vec<EntityId> {
        self.means.keys().copied().collect()
    }

    fn estimate(&self, _param: &RecommendParam, item_id: EntityId, _config: &DataConfig) -> Option<f64> {
        self.mean(item_id)
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

impl ModelAlgorithm for ItemMean {
    const NAME: &'static str = ITEM_MEAN_NAME;

    fn default_config() -> DataConfig {
        let mut config = recommender_defaults();
        config.put_unchecked(LEARN_STEP_DELAY_FIELD, 0);
        config
    }
}
