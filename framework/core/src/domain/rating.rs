// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Rating vectors, profiles and scored pairs
//!
//! A [`RatingVector`] is the preference history of one entity: a user vector
//! maps item ids to ratings, an item vector maps user ids to ratings. Ids are
//! non-negative; a negative id means "not part of the dataset".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Entity identifier (user or item)
pub type EntityId = i32;

/// Preference history of a single user or item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingVector {
    id: EntityId,
    #[serde(default)]
    ratings: BTreeMap<EntityId, f64>,
}

impl RatingVector {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            ratings: BTreeMap::new(),
        }
    }

    pub fn with_ratings(id: EntityId, ratings: impl IntoIterator<Item = (EntityId, f64)>) -> Self {
        Self {
            id,
            ratings: ratings.into_iter().collect(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    pub fn get(&self, id: EntityId) -> Option<f64> {
        self.ratings.get(&id).copied()
    }

    pub fn put(&mut self, id: EntityId, value: f64) {
        self.ratings.insert(id, value);
    }

    pub fn remove(&mut self, id: EntityId) -> Option<f64> {
        self.ratings.remove(&id)
    }

    pub fn is_rated(&self, id: EntityId) -> bool {
        self.ratings.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ratings.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, f64)> + '_ {
        self.ratings.iter().map(|(id, value)| (*id, *value))
    }

    /// Copy ratings from `stored` that this vector does not already carry.
    /// Caller-supplied ratings always win.
    pub fn merge_missing(&mut self, stored: &RatingVector) {
        for (id, value) in stored.iter() {
            self.ratings.entry(id).or_insert(value);
        }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.ratings.is_empty() {
            return None;
        }
        Some(self.ratings.values().sum::<f64>() / self.ratings.len() as f64)
    }

    /// Cosine similarity over co-rated ids; `None` when nothing is shared
    pub fn cosine(&self, other: &RatingVector) -> Option<f64> {
        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;
        let mut shared = 0usize;
        for (id, a) in self.iter() {
            if let Some(b) = other.get(id) {
                dot += a * b;
                norm_a += a * a;
                norm_b += b * b;
                shared += 1;
            }
        }

        if shared == 0 || norm_a == 0.0 || norm_b == 0.0 {
            return None;
        }
        Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
    }
}

/// Descriptive attributes of a user or item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: EntityId,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl Profile {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Scored candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub key: EntityId,
    pub value: f64,
}

impl Pair {
    pub fn new(key: EntityId, value: f64) -> Self {
        Self { key, value }
    }
}

/// First position whose value is strictly less than `value`.
///
/// Inserting there keeps a descending list sorted and places a new entry
/// after every existing entry with an equal value.
pub fn find_index_of_less_than(value: f64, pairs: &[Pair]) -> Option<usize> {
    pairs.iter().position(|pair| pair.value < value)
}

/// First position whose value is strictly greater than `value` (ascending lists)
pub fn find_index_of_greater_than(value: f64, pairs: &[Pair]) -> Option<usize> {
    pairs.iter().position(|pair| pair.value > value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_missing_keeps_caller_ratings() {
        let mut query = RatingVector::with_ratings(1, [(10, 5.0)]);
        let stored = RatingVector::with_ratings(1, [(10, 1.0), (11, 3.0)]);
        query.merge_missing(&stored);

        assert_eq!(query.get(10), Some(5.0));
        assert_eq!(query.get(11), Some(3.0));
    }

    #[test]
    fn test_cosine_requires_shared_ids() {
        let a = RatingVector::with_ratings(1, [(1, 1.0), (2, 2.0)]);
        let b = RatingVector::with_ratings(2, [(3, 4.0)]);
        assert_eq!(a.cosine(&b), None);

        let c = RatingVector::with_ratings(3, [(1, 2.0), (2, 4.0)]);
        let sim = a.cosine(&c).unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_find_index_places_ties_after_existing() {
        let pairs = vec![Pair::new(1, 0.9), Pair::new(2, 0.5)];
        assert_eq!(find_index_of_less_than(0.9, &pairs), Some(1));
        assert_eq!(find_index_of_less_than(0.95, &pairs), Some(0));
        assert_eq!(find_index_of_less_than(0.1, &pairs), None);
    }

    #[test]
    fn test_find_index_of_greater_than() {
        let pairs = vec![Pair::new(1, 0.1), Pair::new(2, 0.5)];
        assert_eq!(find_index_of_greater_than(0.3, &pairs), Some(1));
        assert_eq!(find_index_of_greater_than(0.5, &pairs), None);
    }
}
