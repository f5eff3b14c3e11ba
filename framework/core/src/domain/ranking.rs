// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Ranking Engine
//!
//! Turns raw estimates into bounded top-K recommendation lists.
//!
//! A request flows through three stages:
//!
//! 1. [`recommend_preprocess`] completes the caller's param with the stored
//!    preference vector and profile of the entity being served.
//! 2. [`select_candidates`] drops candidates the entity already rated and
//!    candidates rejected by the filter pipeline, preserving scan order.
//! 3. [`rank`] estimates each survivor, applies the relevance test, and keeps
//!    a sorted list of at most `K` entries with stable tie-breaking.
//!
//! Normal mode sorts descending and keeps estimates above the relevance
//! threshold. Reserved mode sorts ascending and keeps the complementary side.

use crate::domain::config::{
    DataConfig, FAST_RECOMMEND_FIELD, RELEVANT_RATING_FIELD, RESERVED_RECOMMEND_FIELD,
};
use crate::domain::dataset::Dataset;
use crate::domain::filter::{FilterCandidate, RecommendFilterList};
use crate::domain::param::RecommendParam;
use crate::domain::rating::{
    find_index_of_greater_than, find_index_of_less_than, EntityId, Pair, RatingVector,
};
use serde::{Deserialize, Serialize};

/// Ordered recommendation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendList {
    pub user_id: EntityId,
    pub items: Vec<Pair>,
}

impl RecommendList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_ids(&self) -> Vec<EntityId> {
        self.items.iter().map(|p| p.key).collect()
    }

    pub fn to_rating_vector(&self) -> RatingVector {
        RatingVector::with_ratings(self.user_id, self.items.iter().map(|p| (p.key, p.value)))
    }
}

/// Per-request ranking knobs, read from the algorithm configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RankingOptions {
    /// Zero collects every qualifying candidate
    pub max_recommend: usize,
    pub fast: bool,
    pub reserved: bool,
    pub relevant_threshold: Option<f64>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
}

impl RankingOptions {
    /// `max_recommend <= 0` means "no limit"
    pub fn from_config(config: &DataConfig, max_recommend: i32) -> Self {
        Self {
            max_recommend: usize::try_from(max_recommend).unwrap_or(0),
            fast: config.get_as_bool(FAST_RECOMMEND_FIELD).unwrap_or(false),
            reserved: config.get_as_bool(RESERVED_RECOMMEND_FIELD).unwrap_or(false),
            relevant_threshold: relevant_threshold(config),
            min_rating: config.min_rating(),
            max_rating: config.max_rating(),
        }
    }

    /// Score at which a full list can stop scanning
    fn extreme(&self) -> Option<f64> {
        if self.reserved {
            self.min_rating
        } else {
            self.max_rating
        }
    }

    fn accepts(&self, value: f64) -> bool {
        match self.relevant_threshold {
            None => true,
            Some(threshold) if self.reserved => value <= threshold,
            Some(threshold) => value > threshold,
        }
    }
}

/// Explicit `relevant_rating`, else the midpoint of the rating scale
pub fn relevant_threshold(config: &DataConfig) -> Option<f64> {
    if let Some(threshold) = config.get_as_f64(RELEVANT_RATING_FIELD) {
        return Some(threshold);
    }
    match (config.min_rating(), config.max_rating()) {
        (Some(min), Some(max)) => Some((min + max) / 2.0),
        _ => None,
    }
}

/// Complete a query param with stored data.
///
/// An empty caller vector is replaced by the stored one; otherwise stored
/// ratings the caller did not supply are merged in. A missing profile is
/// filled from the dataset. Returns `None` when no preference vector exists.
pub fn recommend_preprocess(param: &RecommendParam, dataset: Option<&dyn Dataset>) -> Option<RecommendParam> {
    let mut param = param.clone();
    let user_id = param.rating_vector.id();
    let stored = dataset.and_then(|d| d.user_rating(user_id));

    if param.rating_vector.is_empty() {
        let stored = stored?;
        if stored.is_empty() {
            return None;
        }
        param.rating_vector = stored;
    } else if let Some(stored) = stored {
        param.rating_vector.merge_missing(&stored);
    }

    if param.profile.is_none() {
        param.profile = dataset.and_then(|d| d.user_profile(user_id));
    }
    Some(param)
}

/// Candidates not yet rated by the query entity and accepted by every filter
pub fn select_candidates(
    param: &RecommendParam,
    candidates: impl IntoIterator<Item = EntityId>,
    filters: &RecommendFilterList,
    dataset: Option<&dyn Dataset>,
) -> Vec<EntityId> {
    let user_id = param.rating_vector.id();
    candidates
        .into_iter()
        .filter(|item_id| !param.rating_vector.is_rated(*item_id))
        .filter(|item_id| {
            filters.filter(
                dataset,
                &FilterCandidate {
                    user_id,
                    item_id: *item_id,
                },
            )
        })
        .collect()
}

/// Estimate and rank candidates in scan order.
///
/// Unusable estimates (`None`, NaN, infinite) and estimates failing the
/// relevance test are skipped. Ties keep scan order.
pub fn rank<I, F>(candidates: I, options: &RankingOptions, mut estimate: F) -> Vec<Pair>
where
    I: IntoIterator<Item = EntityId>,
    F: FnMut(EntityId) -> Option<f64>,
{
    let max = options.max_recommend;
    let extreme = options.extreme();
    let mut pairs: Vec<Pair> = Vec::new();

    for item_id in candidates {
        let Some(value) = estimate(item_id).filter(|v| v.is_finite()) else {
            continue;
        };
        if !options.accepts(value) {
            continue;
        }

        let found = if options.reserved {
            find_index_of_greater_than(value, &pairs)
        } else {
            find_index_of_less_than(value, &pairs)
        };
        let pair = Pair::new(item_id, value);
        match found {
            Some(index) => pairs.insert(index, pair),
            None => pairs.push(pair),
        }

        let n = pairs.len();
        if max > 0 && n >= max {
            let last = pairs[n - 1].value;
            if options.fast || extreme.is_some_and(|e| last == e) {
                break;
            }
            if n > max {
                pairs.truncate(max);
            }
        }
    }

    if max > 0 && pairs.len() > max {
        pairs.truncate(max);
    }
    pairs
}

pub fn to_recommend_list(user_id: EntityId, pairs: Vec<Pair>) -> Option<RecommendList> {
    if pairs.is_empty() {
        None
    } else {
        Some(RecommendList { user_id, items: pairs })
    }
}
