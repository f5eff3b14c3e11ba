// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Query context for one ranking request

use crate::domain::rating::{EntityId, Profile, RatingVector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named piece of request context (time, location, device, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextList(pub Vec<Context>);

impl ContextList {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|c| c.name == name).map(|c| &c.value)
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.push(Context {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Known preferences, profile and context of the entity being served.
///
/// The ranking engine clones the param before filling in stored data, so the
/// caller's copy is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendParam {
    pub rating_vector: RatingVector,
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub context_list: ContextList,
    #[serde(default)]
    pub extra: Option<Value>,
}

impl RecommendParam {
    /// Param for a known user with no caller-supplied ratings
    pub fn for_user(user_id: EntityId) -> Self {
        Self {
            rating_vector: RatingVector::new(user_id),
            ..Self::default()
        }
    }

    pub fn from_vector(rating_vector: RatingVector) -> Self {
        Self {
            rating_vector,
            ..Self::default()
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn user_id(&self) -> EntityId {
        self.rating_vector.id()
    }
}
