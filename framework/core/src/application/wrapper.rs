// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Recommender Wrapper
//!
//! One recommender interface over either a native local recommender or a
//! stub to a remote one ([`AlgTarget`]). Callers do not need to know which.
//!
//! ## Ownership
//!
//! An *exclusive* wrapper owns its target. [`RecommenderWrapper::release`]
//! unsets it up and, for remote targets, unexports the remote object. This
//! happens exactly once; afterwards every call fails with
//! [`AlgError::Released`]. Owners are expected to call `release` themselves.
//! Dropping an exclusive wrapper that was not released logs a warning and, as
//! a fallback, schedules the same cleanup on the current runtime.
//!
//! Non-exclusive wrappers never touch the target's lifetime.

use crate::domain::alg::{Alg, AlgError, AlgKind};
use crate::domain::config::{DataConfig, SharedConfig};
use crate::domain::dataset::Dataset;
use crate::domain::events::EventListener;
use crate::domain::filter::{RecommendFilter, RecommendFilterList};
use crate::domain::learning::LearnControl;
use crate::domain::param::RecommendParam;
use crate::domain::ranking::RecommendList;
use crate::domain::rating::{EntityId, RatingVector};
use crate::domain::recommender::Recommender;
use crate::infrastructure::remote_client::RemoteRecommender;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Where the calls of a wrapper go
#[derive(Clone)]
pub enum AlgTarget {
    Local(Arc<dyn Recommender>),
    Remote(Arc<RemoteRecommender>),
}

impl AlgTarget {
    fn recommender(&self) -> Arc<dyn Recommender> {
        match self {
            AlgTarget::Local(alg) => Arc::clone(alg),
            AlgTarget::Remote(stub) => Arc::clone(stub) as Arc<dyn Recommender>,
        }
    }

    /// Undo the target's setup and, when remote, unexport it
    async fn shut_down(self) {
        match self {
            AlgTarget::Local(alg) => {
                if let Err(e) = alg.unsetup().await {
                    warn!(alg = %alg.name(), error = %e, "Unsetup on release failed");
                }
            }
            AlgTarget::Remote(stub) => {
                if let Err(e) = stub.unsetup().await {
                    warn!(alg = %stub.name(), error = %e, "Remote unsetup on release failed");
                }
                if let Err(e) = stub.release().await {
                    warn!(alg = %stub.name(), error = %e, "Remote unexport on release failed");
                }
            }
        }
    }
}

pub struct RecommenderWrapper {
    target: RwLock<Option<AlgTarget>>,
    release_lock: Mutex<()>,
    exclusive: bool,
    name: String,
}

impl RecommenderWrapper {
    pub fn new(target: AlgTarget, exclusive: bool) -> Self {
        let name = target.recommender().name();
        Self {
            target: RwLock::new(Some(target)),
            release_lock: Mutex::new(()),
            exclusive,
            name,
        }
    }

    pub fn local(alg: Arc<dyn Recommender>, exclusive: bool) -> Self {
        Self::new(AlgTarget::Local(alg), exclusive)
    }

    pub fn remote(stub: RemoteRecommender, exclusive: bool) -> Self {
        Self::new(AlgTarget::Remote(Arc::new(stub)), exclusive)
    }

    /// Wrapper over the exported object at `url`
    pub async fn connect(url: impl Into<String>, exclusive: bool) -> Result<Self, AlgError> {
        Ok(Self::remote(RemoteRecommender::connect(url).await?, exclusive))
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn is_remote(&self) -> bool {
        matches!(*self.target.read(), Some(AlgTarget::Remote(_)))
    }

    pub fn is_released(&self) -> bool {
        self.target.read().is_none()
    }

    pub fn target(&self) -> Option<AlgTarget> {
        self.target.read().clone()
    }

    fn current(&self) -> Result<Arc<dyn Recommender>, AlgError> {
        self.target
            .read()
            .as_ref()
            .map(AlgTarget::recommender)
            .ok_or(AlgError::Released)
    }

    /// Detach the target. Exclusive wrappers also shut it down. Safe to call
    /// more than once.
    pub async fn release(&self) {
        let _guard = self.release_lock.lock().await;
        let target = self.target.write().take();
        let Some(target) = target else {
            return;
        };
        if self.exclusive {
            target.shut_down().await;
        }
        debug!(alg = %self.name, exclusive = self.exclusive, "Wrapper released");
    }
}

impl Drop for RecommenderWrapper {
    fn drop(&mut self) {
        if !self.exclusive {
            return;
        }
        let Some(target) = self.target.get_mut().take() else {
            return;
        };
        warn!(alg = %self.name, "Exclusive wrapper dropped without release");
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(target.shut_down());
            }
            Err(_) => {
                warn!(alg = %self.name, "No runtime to shut the target down, cleanup skipped");
            }
        }
    }
}

impl Alg for RecommenderWrapper {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> AlgKind {
        match &*self.target.read() {
            Some(AlgTarget::Local(alg)) => alg.kind(),
            Some(AlgTarget::Remote(_)) | None => AlgKind::Service,
        }
    }

    fn config(&self) -> SharedConfig {
        match self.current() {
            Ok(alg) => alg.config(),
            Err(_) => DataConfig::new().shared(),
        }
    }

    fn create_default_config(&self) -> DataConfig {
        self.current()
            .map(|alg| alg.create_default_config())
            .unwrap_or_default()
    }

    fn reset_config(&self) {
        if let Ok(alg) = self.current() {
            alg.reset_config();
        }
    }
}

#[async_trait]
impl Recommender for RecommenderWrapper {
    async fn setup(&self, dataset: Arc<dyn Dataset>) -> Result<(), AlgError> {
        self.current()?.setup(dataset).await
    }

    async fn unsetup(&self) -> Result<(), AlgError> {
        self.current()?.unsetup().await
    }

    async fn estimate(
        &self,
        param: &RecommendParam,
        item_ids: &[EntityId],
    ) -> Result<Option<RatingVector>, AlgError> {
        self.current()?.estimate(param, item_ids).await
    }

    async fn recommend(
        &self,
        param: &RecommendParam,
        max_recommend: i32,
    ) -> Result<Option<RecommendList>, AlgError> {
        self.current()?.recommend(param, max_recommend).await
    }

    /// New exclusive wrapper around a new target; never `self`
    async fn new_instance(&self) -> Result<Arc<dyn Recommender>, AlgError> {
        let target = self.target().ok_or(AlgError::Released)?;
        let wrapper = match target {
            AlgTarget::Local(alg) => Self::local(alg.new_instance().await?, true),
            AlgTarget::Remote(stub) => Self::remote(stub.new_remote_instance().await?, true),
        };
        Ok(Arc::new(wrapper))
    }

    fn filter_list(&self) -> Result<RecommendFilterList, AlgError> {
        self.current()?.filter_list()
    }

    fn add_filter(&self, filter: Arc<dyn RecommendFilter>) -> Result<(), AlgError> {
        self.current()?.add_filter(filter)
    }

    fn dataset(&self) -> Option<Arc<dyn Dataset>> {
        self.current().ok().and_then(|alg| alg.dataset())
    }

    fn add_setup_listener(&self, listener: Arc<dyn EventListener>) {
        if let Ok(alg) = self.current() {
            alg.add_setup_listener(listener);
        }
    }

    fn learn_control(&self) -> Option<LearnControl> {
        self.current().ok().and_then(|alg| alg.learn_control())
    }
}
