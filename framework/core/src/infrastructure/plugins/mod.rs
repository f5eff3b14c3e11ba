// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Built-in algorithms, one per recommender kind

pub mod item_mean;
pub mod user_knn;

use crate::application::composite::CompositeRecommender;
use crate::application::memory_based::MemoryBasedRecommender;
use crate::application::model_based::ModelBasedRecommender;
use crate::application::registry::AlgRegistry;
use crate::domain::kbase::KBaseContext;
use crate::domain::recommender::Recommender;
use std::sync::Arc;

pub use item_mean::{ItemMean, ITEM_MEAN_NAME};
pub use user_knn::{UserKnn, USER_KNN_NAME};

pub const MEAN_COMPOSITE_NAME: &str = "mean_composite";

pub fn user_knn() -> Arc<dyn Recommender> {
    Arc::new(MemoryBasedRecommender::new(UserKnn::new()))
}

pub fn item_mean(context: &KBaseContext) -> Arc<dyn Recommender> {
    Arc::new(ModelBasedRecommender::<ItemMean>::new(context.clone()))
}

/// Average of `user_knn` and `item_mean`
pub fn mean_composite(context: &KBaseContext) -> Arc<dyn Recommender> {
    Arc::new(CompositeRecommender::new(
        MEAN_COMPOSITE_NAME,
        vec![user_knn(), item_mean(context)],
    ))
}

pub fn register_builtin(registry: &AlgRegistry, context: &KBaseContext) {
    registry.register(user_knn());
    registry.register(item_mean(context));
    registry.register(mean_composite(context));
}
