// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! User-based nearest-neighbour collaborative filtering
//!
//! Predicts `mean(u) + Σ sim(u,v)·(r(v,i) − mean(v)) / Σ |sim(u,v)|` over the
//! `neighbors` most similar users who rated item `i`. Similarity is cosine
//! over co-rated items, memoized in the symmetric pairwise cache when
//! `support_cache` is on.

use crate::application::base::recommender_defaults;
use crate::application::memory_based::MemoryEstimator;
use crate::domain::cache::SymmetricCache;
use crate::domain::config::DataConfig;
use crate::domain::dataset::Dataset;
use crate::domain::param::RecommendParam;
use crate::domain::rating::EntityId;

pub const USER_KNN_NAME: &str = "user_knn";
pub const NEIGHBORS_FIELD: &str = "neighbors";
pub const NEIGHBORS_DEFAULT: i64 = 20;

#[derive(Default)]
pub struct UserKnn {
    similarities: SymmetricCache<Option<f64>>,
}

impl UserKnn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_similarities(&self) -> usize {
        self.similarities.len()
    }
}

impl MemoryEstimator for UserKnn {
    fn name(&self) -> &str {
        USER_KNN_NAME
    }

    fn default_config(&self) -> DataConfig {
        let mut config = recommender_defaults();
        config.put_unchecked(NEIGHBORS_FIELD, NEIGHBORS_DEFAULT);
        config
    }

    fn fresh(&self) -> Self {
        Self::new()
    }

    fn on_setup(&self, _dataset: &dyn Dataset, _config: &DataConfig) {
        self.similarities.clear();
    }

    fn on_unsetup(&self) {
        self.similarities.clear();
    }

    fn estimate(
        &self,
        dataset: &dyn Dataset,
        config: &DataConfig,
        param: &RecommendParam,
        item_id: EntityId,
    ) -> Option<f64> {
        let user = &param.rating_vector;
        let user_mean = user.mean()?;
        let raters = dataset.item_rating(item_id)?;
        let cached = config.is_cached();
        let k = config
            .get_as_i64(NEIGHBORS_FIELD)
            .and_then(|k| usize::try_from(k).ok())
            .unwrap_or(0);

        let mut neighbors: Vec<(f64, f64)> = raters
            .iter()
            .filter(|(other_id, _)| *other_id != user.id())
            .filter_map(|(other_id, rating)| {
                let other = dataset.user_rating(other_id)?;
                let sim = self
                    .similarities
                    .cache_value(cached, user.id(), other_id, || user.cosine(&other))?;
                (sim > 0.0).then(|| (sim, rating - other.mean().unwrap_or(rating)))
            })
            .collect();
        if neighbors.is_empty() {
            return None;
        }

        neighbors.sort_by(|a, b| b.0.total_cmp(&a.0));
        if k > 0 {
            neighbors.truncate(k);
        }

        let weight: f64 = neighbors.iter().map(|(sim, _)| sim.abs()).sum();
        let deviation: f64 = neighbors.iter().map(|(sim, dev)| sim * dev).sum();
        let mut value = user_mean + deviation / weight;

        if let Some(min) = config.min_rating() {
            value = value.max(min);
        }
        if let Some(max) = config.max_rating() {
            value = value.min(max);
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::SUPPORT_CACHE_FIELD;
    use crate::domain::rating::RatingVector;
    use crate::infrastructure::dataset::MemDataset;

    fn dataset() -> MemDataset {
        MemDataset::new(1.0, 5.0)
            .with_user_rating(RatingVector::with_ratings(1, [(10, 5.0), (11, 3.0)]))
            .with_user_rating(RatingVector::with_ratings(2, [(10, 4.0), (11, 2.0), (12, 5.0)]))
            .with_user_rating(RatingVector::with_ratings(3, [(10, 1.0), (12, 1.0)]))
    }

    #[test]
    fn test_estimate_uses_similar_neighbors_and_caches_symmetrically() {
        let knn = UserKnn::new();
        let dataset = dataset();
        let mut config = knn.default_config();
        config.set_metadata(dataset.metadata());

        let param = RecommendParam::from_vector(dataset.user_rating(1).unwrap());
        let value = knn.estimate(&dataset, &config, &param, 12).unwrap();

        assert!((1.0..=5.0).contains(&value));
        assert!(knn.cached_similarities() >= 2);
    }

    #[test]
    fn test_cache_switch_off_stores_nothing() {
        let knn = UserKnn::new();
        let dataset = dataset();
        let mut config = knn.default_config();
        config.put(SUPPORT_CACHE_FIELD, false).unwrap();

        let param = RecommendParam::from_vector(dataset.user_rating(1).unwrap());
        knn.estimate(&dataset, &config, &param, 12);
        assert_eq!(knn.cached_similarities(), 0);
    }

    #[test]
    fn test_item_without_raters_has_no_estimate() {
        let knn = UserKnn::new();
        let dataset = dataset();
        let config = knn.default_config();
        let param = RecommendParam::from_vector(dataset.user_rating(1).unwrap());
        assert!(knn.estimate(&dataset, &config, &param, 99).is_none());
    }
}
