// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory datasets
//!
//! `MemDataset` keeps user rating vectors and profiles in memory; item vectors
//! are derived by transposition on demand. It is the dataset the service host
//! loads from a JSON snapshot and the one remote setup ships across the wire.
//!
//! `MemDatasetCatalog` is the `DatasetResolver` used to reconnect a knowledge
//! base to its datasource after `load`.

use crate::domain::config::{DataConfig, DatasetMetadata, SharedConfig, MAX_RATING_FIELD, MIN_RATING_FIELD};
use crate::domain::dataset::{
    Dataset, DatasetError, DatasetResolver, DatasetSnapshot, Fetcher, RatingTriple,
};
use crate::domain::rating::{EntityId, Profile, RatingVector};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct MemData {
    user_ratings: BTreeMap<EntityId, RatingVector>,
    user_profiles: BTreeMap<EntityId, Profile>,
    item_profiles: BTreeMap<EntityId, Profile>,
}

/// Dataset held entirely in memory
pub struct MemDataset {
    uri: Option<String>,
    exclusive: bool,
    config: SharedConfig,
    data: RwLock<MemData>,
}

impl MemDataset {
    /// Empty dataset on the rating scale `[min_rating, max_rating]`
    pub fn new(min_rating: f64, max_rating: f64) -> Self {
        let mut config = DataConfig::new();
        config.put_unchecked(MIN_RATING_FIELD, min_rating);
        config.put_unchecked(MAX_RATING_FIELD, max_rating);
        Self {
            uri: None,
            exclusive: false,
            config: config.shared(),
            data: RwLock::new(MemData::default()),
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Mark the dataset as owned by whoever connects to it
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_user_rating(self, vector: RatingVector) -> Self {
        self.data.write().user_ratings.insert(vector.id(), vector);
        self
    }

    pub fn with_user_profile(self, profile: Profile) -> Self {
        self.data.write().user_profiles.insert(profile.id, profile);
        self
    }

    pub fn with_item_profile(self, profile: Profile) -> Self {
        self.data.write().item_profiles.insert(profile.id, profile);
        self
    }

    pub fn user_count(&self) -> usize {
        self.data.read().user_ratings.len()
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, DatasetError> {
        let snapshot: DatasetSnapshot =
            serde_json::from_slice(bytes).map_err(|e| DatasetError::Serialization(e.to_string()))?;
        Ok(Self::from(snapshot))
    }

    pub fn to_json(&self) -> Result<Vec<u8>, DatasetError> {
        serde_json::to_vec_pretty(&self.build_snapshot())
            .map_err(|e| DatasetError::Serialization(e.to_string()))
    }

    fn build_snapshot(&self) -> DatasetSnapshot {
        let data = self.data.read();
        DatasetSnapshot {
            uri: self.uri.clone(),
            config: self.config.read().clone(),
            user_ratings: data.user_ratings.values().cloned().collect(),
            user_profiles: data.user_profiles.values().cloned().collect(),
            item_profiles: data.item_profiles.values().cloned().collect(),
        }
    }

    fn item_vectors(&self) -> BTreeMap<EntityId, RatingVector> {
        let data = self.data.read();
        let mut items: BTreeMap<EntityId, RatingVector> = BTreeMap::new();
        for (user_id, vector) in &data.user_ratings {
            for (item_id, rating) in vector.iter() {
                items
                    .entry(item_id)
                    .or_insert_with(|| RatingVector::new(item_id))
                    .put(*user_id, rating);
            }
        }
        items
    }

    fn item_ids(&self) -> BTreeSet<EntityId> {
        let data = self.data.read();
        let mut ids: BTreeSet<EntityId> = data.item_profiles.keys().copied().collect();
        for vector in data.user_ratings.values() {
            ids.extend(vector.ids());
        }
        ids
    }
}

impl From<DatasetSnapshot> for MemDataset {
    fn from(snapshot: DatasetSnapshot) -> Self {
        let data = MemData {
            user_ratings: snapshot
                .user_ratings
                .into_iter()
                .map(|vector| (vector.id(), vector))
                .collect(),
            user_profiles: snapshot
                .user_profiles
                .into_iter()
                .map(|profile| (profile.id, profile))
                .collect(),
            item_profiles: snapshot
                .item_profiles
                .into_iter()
                .map(|profile| (profile.id, profile))
                .collect(),
        };
        Self {
            uri: snapshot.uri,
            exclusive: false,
            config: snapshot.config.shared(),
            data: RwLock::new(data),
        }
    }
}

impl Dataset for MemDataset {
    fn config(&self) -> SharedConfig {
        Arc::clone(&self.config)
    }

    fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    fn uri(&self) -> Option<String> {
        self.uri.clone()
    }

    fn metadata(&self) -> DatasetMetadata {
        let (min_rating, max_rating) = {
            let config = self.config.read();
            (config.min_rating(), config.max_rating())
        };
        let data = self.data.read();
        let (scan_min, scan_max) = data
            .user_ratings
            .values()
            .flat_map(|vector| vector.iter().map(|(_, rating)| rating))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(r), hi.max(r)));
        let user_count = data.user_ratings.len();
        drop(data);

        DatasetMetadata {
            min_rating: min_rating.unwrap_or(if scan_min.is_finite() { scan_min } else { 0.0 }),
            max_rating: max_rating.unwrap_or(if scan_max.is_finite() { scan_max } else { 0.0 }),
            user_count,
            item_count: self.item_ids().len(),
        }
    }

    fn fetch_user_ids(&self) -> Fetcher<EntityId> {
        Fetcher::from_vec(self.data.read().user_ratings.keys().copied().collect())
    }

    fn fetch_item_ids(&self) -> Fetcher<EntityId> {
        Fetcher::from_vec(self.item_ids().into_iter().collect())
    }

    fn fetch_user_ratings(&self) -> Fetcher<RatingVector> {
        Fetcher::from_vec(self.data.read().user_ratings.values().cloned().collect())
    }

    fn fetch_item_ratings(&self) -> Fetcher<RatingVector> {
        Fetcher::from_vec(self.item_vectors().into_values().collect())
    }

    fn fetch_sample(&self) -> Fetcher<RatingTriple> {
        let data = self.data.read();
        let rows = data
            .user_ratings
            .values()
            .flat_map(|vector| {
                let user_id = vector.id();
                vector.iter().map(move |(item_id, rating)| RatingTriple {
                    user_id,
                    item_id,
                    rating,
                })
            })
            .collect();
        Fetcher::from_vec(rows)
    }

    fn user_rating(&self, user_id: EntityId) -> Option<RatingVector> {
        self.data.read().user_ratings.get(&user_id).cloned()
    }

    fn item_rating(&self, item_id: EntityId) -> Option<RatingVector> {
        let vector = self.item_vectors().remove(&item_id)?;
        Some(vector)
    }

    fn user_profile(&self, user_id: EntityId) -> Option<Profile> {
        self.data.read().user_profiles.get(&user_id).cloned()
    }

    fn item_profile(&self, item_id: EntityId) -> Option<Profile> {
        self.data.read().item_profiles.get(&item_id).cloned()
    }

    fn clear(&self) {
        let mut data = self.data.write();
        data.user_ratings.clear();
        data.user_profiles.clear();
        data.item_profiles.clear();
        debug!(uri = ?self.uri, "In-memory dataset cleared");
    }

    fn snapshot(&self) -> Option<DatasetSnapshot> {
        Some(self.build_snapshot())
    }
}

/// URI → dataset table
#[derive(Default)]
pub struct MemDatasetCatalog {
    datasets: RwLock<HashMap<String, Arc<dyn Dataset>>>,
}

impl MemDatasetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset under its own URI
    pub fn register(&self, dataset: Arc<dyn Dataset>) -> Result<(), DatasetError> {
        let uri = dataset
            .uri()
            .ok_or_else(|| DatasetError::Invalid("dataset has no URI".to_string()))?;
        self.insert(uri, dataset);
        Ok(())
    }

    pub fn insert(&self, uri: impl Into<String>, dataset: Arc<dyn Dataset>) {
        self.datasets.write().insert(uri.into(), dataset);
    }

    pub fn len(&self) -> usize {
        self.datasets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.read().is_empty()
    }
}

impl DatasetResolver for MemDatasetCatalog {
    fn resolve(&self, uri: &str) -> Result<Arc<dyn Dataset>, DatasetError> {
        self.datasets
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| DatasetError::Unresolvable(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemDataset {
        MemDataset::new(1.0, 5.0)
            .with_uri("mem://sample")
            .with_user_rating(RatingVector::with_ratings(1, [(10, 4.0), (11, 2.0)]))
            .with_user_rating(RatingVector::with_ratings(2, [(10, 5.0)]))
    }

    #[test]
    fn test_item_vectors_are_transposed() {
        let dataset = sample();
        let item = dataset.item_rating(10).unwrap();
        assert_eq!(item.get(1), Some(4.0));
        assert_eq!(item.get(2), Some(5.0));
        assert_eq!(dataset.fetch_item_ids().collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn test_metadata_reports_scale_and_counts() {
        let metadata = sample().metadata();
        assert_eq!(metadata.min_rating, 1.0);
        assert_eq!(metadata.max_rating, 5.0);
        assert_eq!(metadata.user_count, 2);
        assert_eq!(metadata.item_count, 2);
    }

    #[test]
    fn test_json_snapshot_round_trip() {
        let dataset = sample();
        let restored = MemDataset::from_json(&dataset.to_json().unwrap()).unwrap();
        assert_eq!(restored.user_rating(1), dataset.user_rating(1));
        assert_eq!(restored.uri().as_deref(), Some("mem://sample"));
    }

    #[test]
    fn test_catalog_resolves_registered_uri() {
        let catalog = MemDatasetCatalog::new();
        catalog.register(Arc::new(sample())).unwrap();

        assert!(catalog.resolve("mem://sample").is_ok());
        assert!(matches!(
            catalog.resolve("mem://missing"),
            Err(DatasetError::Unresolvable(_))
        ));
    }
}
