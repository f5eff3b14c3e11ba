// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupEventKind {
    Doing,
    Done,
}

/// Setup/learning lifecycle notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupAlgEvent {
    pub kind: SetupEventKind,
    pub alg_name: String,
    pub dataset_uri: Option<String>,
    pub result: Option<Value>,
    pub progress_step: u64,
    pub progress_total: u64,
    pub timestamp: DateTime<Utc>,
}

impl SetupAlgEvent {
    pub fn doing(alg_name: impl Into<String>, progress_step: u64, progress_total: u64) -> Self {
        Self {
            kind: SetupEventKind::Doing,
            alg_name: alg_name.into(),
            dataset_uri: None,
            result: None,
            progress_step,
            progress_total,
            timestamp: Utc::now(),
        }
    }

    pub fn done(alg_name: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            kind: SetupEventKind::Done,
            alg_name: alg_name.into(),
            dataset_uri: None,
            result,
            progress_step: 0,
            progress_total: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_dataset_uri(mut self, uri: Option<String>) -> Self {
        self.dataset_uri = uri;
        self
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Listener failed: {0}")]
pub struct ListenerError(pub String);

pub trait EventListener: Send + Sync {
    fn receive(&self, event: &SetupAlgEvent) -> Result<(), ListenerError>;
}

/// Synchronized listener collection with isolated delivery
#[derive(Clone, Default)]
pub struct ListenerList {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl ListenerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn EventListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver to every listener. A listener that errors or panics is logged
    /// and skipped; the rest still receive the event.
    pub fn fire(&self, event: &SetupAlgEvent) {
        let listeners: Vec<Arc<dyn EventListener>> = self.listeners.read().clone();
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.receive(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(alg = %event.alg_name, error = %e, "Setup listener failed");
                }
                Err(_) => {
                    warn!(alg = %event.alg_name, "Setup listener panicked");
                }
            }
        }
    }
}
