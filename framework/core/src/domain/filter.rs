// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Filter Pipeline
//!
//! Ordered pre-scoring candidate exclusion. `prepare` runs once per request
//! across all filters in order; `filter` runs once per candidate and the
//! verdict is the logical AND of every filter.

use crate::domain::dataset::Dataset;
use crate::domain::param::RecommendParam;
use crate::domain::rating::EntityId;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Candidate under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterCandidate {
    pub user_id: EntityId,
    pub item_id: EntityId,
}

pub trait RecommendFilter: Send + Sync {
    fn name(&self) -> &str;

    /// Per-request preparation. May adjust the request-scoped param.
    fn prepare(&self, _param: &mut RecommendParam) {}

    /// `true` keeps the candidate
    fn filter(&self, dataset: &dyn Dataset, candidate: &FilterCandidate) -> bool;
}

/// Ordered filter collection
#[derive(Clone, Default)]
pub struct RecommendFilterList {
    filters: Vec<Arc<dyn RecommendFilter>>,
}

impl RecommendFilterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, filter: Arc<dyn RecommendFilter>) {
        self.filters.push(filter);
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn prepare(&self, param: &mut RecommendParam) {
        for filter in &self.filters {
            filter.prepare(param);
        }
    }

    /// Missing dataset or empty list always passes
    pub fn filter(&self, dataset: Option<&dyn Dataset>, candidate: &FilterCandidate) -> bool {
        let Some(dataset) = dataset else {
            return true;
        };
        self.filters.iter().all(|f| f.filter(dataset, candidate))
    }
}

impl fmt::Debug for RecommendFilterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Rejects a fixed set of items
#[derive(Debug, Clone)]
pub struct ExcludeItemsFilter {
    items: HashSet<EntityId>,
}

impl ExcludeItemsFilter {
    pub fn new(items: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

impl RecommendFilter for ExcludeItemsFilter {
    fn name(&self) -> &str {
        "exclude_items"
    }

    fn filter(&self, _dataset: &dyn Dataset, candidate: &FilterCandidate) -> bool {
        !self.items.contains(&candidate.item_id)
    }
}

/// Keeps items whose profile attribute equals a value. Items without a
/// profile are rejected.
#[derive(Debug, Clone)]
pub struct ItemAttributeFilter {
    attribute: String,
    value: Value,
}

impl ItemAttributeFilter {
    pub fn new(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

impl RecommendFilter for ItemAttributeFilter {
    fn name(&self) -> &str {
        "item_attribute"
    }

    fn filter(&self, dataset: &dyn Dataset, candidate: &FilterCandidate) -> bool {
        dataset
            .item_profile(candidate.item_id)
            .and_then(|profile| profile.attributes.get(&self.attribute).cloned())
            .is_some_and(|value| value == self.value)
    }
}
