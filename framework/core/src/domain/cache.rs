// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Symmetric Pairwise Cache
//!
//! Memoizes pairwise computations (similarities between two users, two
//! items) keyed by two non-negative ids. Every write fills both directions
//! with the same value except on the diagonal, where a single self-entry is
//! stored. Negative ids never touch the cache.
//!
//! Tasks run outside the table lock. A task error is returned unchanged and
//! nothing is cached for it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::convert::Infallible;

use crate::domain::rating::EntityId;

/// Two-level `id1 -> (id2 -> value)` table
#[derive(Debug)]
pub struct SymmetricCache<V> {
    table: RwLock<HashMap<EntityId, HashMap<EntityId, V>>>,
}

impl<V> Default for SymmetricCache<V> {
    fn default() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> SymmetricCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id1: EntityId, id2: EntityId) -> Option<V> {
        let table = self.table.read();
        table
            .get(&id1)
            .and_then(|row| row.get(&id2))
            .or_else(|| table.get(&id2).and_then(|row| row.get(&id1)))
            .cloned()
    }

    /// Number of stored entries, counting both directions
    pub fn len(&self) -> usize {
        self.table.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.table.write().clear();
    }

    fn store(&self, id1: EntityId, id2: EntityId, value: V) {
        let mut table = self.table.write();
        if id1 != id2 {
            table.entry(id2).or_default().insert(id1, value.clone());
        }
        table.entry(id1).or_default().insert(id2, value);
    }

    /// Run `task` through the cache.
    ///
    /// With `enabled == false` or a negative id the task always runs and
    /// nothing is stored.
    pub fn cache_task<E>(
        &self,
        enabled: bool,
        id1: EntityId,
        id2: EntityId,
        task: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if !enabled || id1 < 0 || id2 < 0 {
            return task();
        }
        if let Some(value) = self.get(id1, id2) {
            return Ok(value);
        }
        let value = task()?;
        self.store(id1, id2, value.clone());
        Ok(value)
    }

    pub fn cache_value(&self, enabled: bool, id1: EntityId, id2: EntityId, task: impl FnOnce() -> V) -> V {
        match self.cache_task::<Infallible>(enabled, id1, id2, || Ok(task())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

/// Flat `id -> value` cache with the same bypass rules
#[derive(Debug)]
pub struct ValueCache<V> {
    table: RwLock<HashMap<EntityId, V>>,
}

impl<V> Default for ValueCache<V> {
    fn default() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> ValueCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: EntityId) -> Option<V> {
        self.table.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    pub fn clear(&self) {
        self.table.write().clear();
    }

    pub fn cache_task<E>(&self, enabled: bool, id: EntityId, task: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if !enabled || id < 0 {
            return task();
        }
        if let Some(value) = self.get(id) {
            return Ok(value);
        }
        let value = task()?;
        self.table.write().insert(id, value.clone());
        Ok(value)
    }

    pub fn cache_value(&self, enabled: bool, id: EntityId, task: impl FnOnce() -> V) -> V {
        match self.cache_task::<Infallible>(enabled, id, || Ok(task())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_symmetric_write() {
        let cache = SymmetricCache::new();
        let value = cache.cache_value(true, 3, 7, || 0.42);

        assert_eq!(value, 0.42);
        assert_eq!(cache.get(3, 7), Some(0.42));
        assert_eq!(cache.get(7, 3), Some(0.42));
        assert_eq!(cache.len(), 2);

        let calls = Cell::new(0);
        let again = cache.cache_value(true, 7, 3, || {
            calls.set(calls.get() + 1);
            0.0
        });
        assert_eq!(again, 0.42);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_diagonal_stores_single_entry() {
        let cache = SymmetricCache::new();
        cache.cache_value(true, 5, 5, || 1.0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(5, 5), Some(1.0));
    }

    #[test]
    fn test_negative_id_and_disabled_bypass() {
        let cache = SymmetricCache::new();
        cache.cache_value(true, -1, 4, || 0.5);
        cache.cache_value(false, 1, 4, || 0.5);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_task_error_propagates_and_is_not_cached() {
        let cache: SymmetricCache<f64> = SymmetricCache::new();
        let result: Result<f64, String> = cache.cache_task(true, 1, 2, || Err("bad".to_string()));
        assert_eq!(result, Err("bad".to_string()));
        assert!(cache.get(1, 2).is_none());
    }

    #[test]
    fn test_value_cache() {
        let cache = ValueCache::new();
        assert_eq!(cache.cache_value(true, 9, || 2.5), 2.5);
        assert_eq!(cache.cache_value(true, 9, || 0.0), 2.5);
        cache.cache_value(true, -9, || 1.0);
        assert_eq!(cache.len(), 1);
    }
}
