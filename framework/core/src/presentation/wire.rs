// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON bodies exchanged between an exported recommender and its stubs

use crate::domain::alg::{AlgError, AlgKind};
use crate::domain::config::DataConfig;
use crate::domain::dataset::{Dataset, DatasetKind, DatasetPointer, DatasetSnapshot};
use crate::domain::param::RecommendParam;
use crate::domain::ranking::RecommendList;
use crate::domain::rating::{EntityId, RatingVector};
use crate::infrastructure::dataset::MemDataset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Address of one exported recommender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHandle {
    pub id: Uuid,
    pub name: String,
    pub port: u16,
    /// Base URL of the object, `http://<host>:<port>/objects/<id>`
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgInfo {
    pub id: Uuid,
    pub name: String,
    pub kind: AlgKind,
    pub config: DataConfig,
    pub default_config: DataConfig,
}

/// Dataset shipped to a remote setup. Pointers travel as their config only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDataset {
    pub kind: DatasetKind,
    #[serde(default)]
    pub config: DataConfig,
    #[serde(default)]
    pub snapshot: Option<DatasetSnapshot>,
}

impl WireDataset {
    pub fn from_dataset(dataset: &dyn Dataset) -> Result<Self, AlgError> {
        let kind = dataset.kind();
        let config = dataset.config().read().clone();
        let snapshot = match kind {
            DatasetKind::Regular => Some(dataset.snapshot().ok_or_else(|| {
                AlgError::InvalidDataset("dataset cannot be serialized for remote setup".to_string())
            })?),
            DatasetKind::Pointer | DatasetKind::KBasePointer => None,
        };
        Ok(Self {
            kind,
            config,
            snapshot,
        })
    }

    pub fn into_dataset(self) -> Result<Arc<dyn Dataset>, AlgError> {
        match self.kind {
            DatasetKind::Regular => {
                let snapshot = self.snapshot.ok_or_else(|| {
                    AlgError::InvalidDataset("regular dataset without content".to_string())
                })?;
                Ok(Arc::new(MemDataset::from(snapshot)))
            }
            DatasetKind::Pointer => Ok(Arc::new(DatasetPointer::new(self.config))),
            DatasetKind::KBasePointer => {
                let pointer = DatasetPointer::kbase(None);
                pointer.config().write().put_all(&self.config);
                Ok(Arc::new(pointer))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub param: RecommendParam,
    pub item_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateResponse {
    pub estimates: Option<RatingVector>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub param: RecommendParam,
    pub max_recommend: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub list: Option<RecommendList>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub objects: Vec<RemoteHandle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
