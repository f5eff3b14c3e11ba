// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Recommender Capability
//!
//! The single interface every recommender exposes, satisfied by native local
//! implementations (`crate::application`), by the remote stub
//! (`crate::infrastructure::remote_client`), and by the local/remote wrapper.
//!
//! Implementations serialize `setup`/`unsetup` against each other and against
//! `estimate`/`recommend`; ranking calls may run concurrently.

use crate::domain::alg::{Alg, AlgError};
use crate::domain::dataset::Dataset;
use crate::domain::events::EventListener;
use crate::domain::filter::{RecommendFilter, RecommendFilterList};
use crate::domain::learning::LearnControl;
use crate::domain::param::RecommendParam;
use crate::domain::ranking::RecommendList;
use crate::domain::rating::{EntityId, RatingVector};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Recommender: Alg {
    /// Prepare the recommender on a dataset. Any previous setup is undone first.
    async fn setup(&self, dataset: Arc<dyn Dataset>) -> Result<(), AlgError>;

    /// Undo `setup`. Exclusive datasets are cleared.
    async fn unsetup(&self) -> Result<(), AlgError>;

    /// Estimated ratings of `item_ids` for the entity in `param`.
    /// `None` when nothing could be estimated.
    async fn estimate(
        &self,
        param: &RecommendParam,
        item_ids: &[EntityId],
    ) -> Result<Option<RatingVector>, AlgError>;

    /// Up to `max_recommend` items in ranking order. `max_recommend <= 0`
    /// returns every qualifying item. `None` when nothing qualifies.
    async fn recommend(
        &self,
        param: &RecommendParam,
        max_recommend: i32,
    ) -> Result<Option<RecommendList>, AlgError>;

    /// Structurally independent recommender of the same kind with a default
    /// configuration
    async fn new_instance(&self) -> Result<Arc<dyn Recommender>, AlgError>;

    fn filter_list(&self) -> Result<RecommendFilterList, AlgError>;

    fn add_filter(&self, filter: Arc<dyn RecommendFilter>) -> Result<(), AlgError>;

    /// Dataset of the current setup
    fn dataset(&self) -> Option<Arc<dyn Dataset>>;

    fn add_setup_listener(&self, listener: Arc<dyn EventListener>);

    /// Controller of the long-running learn loop, for algorithms that have one
    fn learn_control(&self) -> Option<LearnControl> {
        None
    }
}
