// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stub for a recommender exported by another process.
//!
//! Forwards every call over HTTP to the exported object. Transport failures,
//! error statuses and undecodable bodies all surface as [`AlgError::Remote`]
//! carrying the original message.
//!
//! The configuration is a local copy fetched on connect; it is pushed to the
//! remote object before each setup and can be re-read with
//! [`RemoteRecommender::refresh_config`].

use crate::domain::alg::{Alg, AlgError, AlgKind};
use crate::domain::config::{DataConfig, SharedConfig};
use crate::domain::dataset::Dataset;
use crate::domain::events::{EventListener, ListenerList, SetupAlgEvent};
use crate::domain::filter::{RecommendFilter, RecommendFilterList};
use crate::domain::param::RecommendParam;
use crate::domain::ranking::RecommendList;
use crate::domain::rating::{EntityId, RatingVector};
use crate::domain::recommender::Recommender;
use crate::presentation::wire::{
    AlgInfo, ErrorBody, EstimateRequest, EstimateResponse, RecommendRequest, RecommendResponse,
    RemoteHandle, WireDataset,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

fn remote_error(e: reqwest::Error) -> AlgError {
    AlgError::Remote(e.to_string())
}

async fn check(response: Response) -> Result<Response, AlgError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(AlgError::Remote(format!("{status}: {message}")))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AlgError> {
    check(response).await?.json::<T>().await.map_err(remote_error)
}

pub struct RemoteRecommender {
    client: Client,
    url: String,
    id: Uuid,
    name: String,
    remote_kind: AlgKind,
    config: SharedConfig,
    default_config: DataConfig,
    dataset: RwLock<Option<Arc<dyn Dataset>>>,
    listeners: ListenerList,
}

impl RemoteRecommender {
    /// Connect to the object at `url` (`http://host:port/objects/<id>`)
    pub async fn connect(url: impl Into<String>) -> Result<Self, AlgError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(remote_error)?;
        Self::connect_with(client, url).await
    }

    pub async fn connect_with(client: Client, url: impl Into<String>) -> Result<Self, AlgError> {
        let url = url.into().trim_end_matches('/').to_string();
        let response = client.get(&url).send().await.map_err(remote_error)?;
        let info: AlgInfo = decode(response).await?;
        debug!(alg = %info.name, url = %url, "Connected to remote recommender");

        Ok(Self {
            client,
            url,
            id: info.id,
            name: info.name,
            remote_kind: info.kind,
            config: info.config.shared(),
            default_config: info.default_config,
            dataset: RwLock::new(None),
            listeners: ListenerList::new(),
        })
    }

    pub async fn from_handle(handle: &RemoteHandle) -> Result<Self, AlgError> {
        Self::connect(handle.url.clone()).await
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Kind of the object behind the stub
    pub fn remote_kind(&self) -> AlgKind {
        self.remote_kind
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/{}", self.url, operation)
    }

    async fn apply_info(&self, response: Response) -> Result<(), AlgError> {
        let info: AlgInfo = decode(response).await?;
        *self.config.write() = info.config;
        Ok(())
    }

    /// Send the local config copy to the remote object and adopt its answer
    pub async fn push_config(&self) -> Result<(), AlgError> {
        let config = self.config.read().clone();
        let response = self
            .client
            .put(self.endpoint("config"))
            .json(&config)
            .send()
            .await
            .map_err(remote_error)?;
        self.apply_info(response).await
    }

    pub async fn refresh_config(&self) -> Result<(), AlgError> {
        let response = self.client.get(&self.url).send().await.map_err(remote_error)?;
        self.apply_info(response).await
    }

    /// Reset the remote config to its defaults and mirror it locally
    pub async fn reset_remote_config(&self) -> Result<(), AlgError> {
        let response = self
            .client
            .post(self.endpoint("reset_config"))
            .send()
            .await
            .map_err(remote_error)?;
        self.apply_info(response).await
    }

    /// Ask the host for a fresh exported instance and connect to it
    pub async fn new_remote_instance(&self) -> Result<RemoteRecommender, AlgError> {
        let response = self
            .client
            .post(self.endpoint("new_instance"))
            .send()
            .await
            .map_err(remote_error)?;
        let handle: RemoteHandle = decode(response).await?;
        Self::connect_with(self.client.clone(), handle.url).await
    }

    /// Unexport the remote object
    pub async fn release(&self) -> Result<(), AlgError> {
        let response = self
            .client
            .delete(&self.url)
            .send()
            .await
            .map_err(remote_error)?;
        check(response).await?;
        Ok(())
    }
}

impl Alg for RemoteRecommender {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> AlgKind {
        AlgKind::Service
    }

    fn config(&self) -> SharedConfig {
        Arc::clone(&self.config)
    }

    fn create_default_config(&self) -> DataConfig {
        self.default_config.clone()
    }
}

#[async_trait]
impl Recommender for RemoteRecommender {
    async fn setup(&self, dataset: Arc<dyn Dataset>) -> Result<(), AlgError> {
        let wire = WireDataset::from_dataset(dataset.as_ref()).map_err(AlgError::into_remote)?;
        self.push_config().await?;
        let response = self
            .client
            .post(self.endpoint("setup"))
            .json(&wire)
            .send()
            .await
            .map_err(remote_error)?;
        check(response).await?;
        self.refresh_config().await?;

        *self.dataset.write() = Some(dataset);
        self.listeners.fire(&SetupAlgEvent::done(self.name.clone(), None));
        Ok(())
    }

    async fn unsetup(&self) -> Result<(), AlgError> {
        let response = self
            .client
            .post(self.endpoint("unsetup"))
            .send()
            .await
            .map_err(remote_error)?;
        check(response).await?;
        self.dataset.write().take();
        Ok(())
    }

    async fn estimate(
        &self,
        param: &RecommendParam,
        item_ids: &[EntityId],
    ) -> Result<Option<RatingVector>, AlgError> {
        let request = EstimateRequest {
            param: param.clone(),
            item_ids: item_ids.to_vec(),
        };
        let response = self
            .client
            .post(self.endpoint("estimate"))
            .json(&request)
            .send()
            .await
            .map_err(remote_error)?;
        let body: EstimateResponse = decode(response).await?;
        Ok(body.estimates)
    }

    async fn recommend(
        &self,
        param: &RecommendParam,
        max_recommend: i32,
    ) -> Result<Option<RecommendList>, AlgError> {
        let request = RecommendRequest {
            param: param.clone(),
            max_recommend,
        };
        let response = self
            .client
            .post(self.endpoint("recommend"))
            .json(&request)
            .send()
            .await
            .map_err(remote_error)?;
        let body: RecommendResponse = decode(response).await?;
        Ok(body.list)
    }

    async fn new_instance(&self) -> Result<Arc<dyn Recommender>, AlgError> {
        Ok(Arc::new(self.new_remote_instance().await?))
    }

    fn filter_list(&self) -> Result<RecommendFilterList, AlgError> {
        Err(AlgError::Unsupported(
            "filters of a remote recommender are not reachable".to_string(),
        ))
    }

    fn add_filter(&self, _filter: Arc<dyn RecommendFilter>) -> Result<(), AlgError> {
        Err(AlgError::Unsupported(
            "filters cannot be sent to a remote recommender".to_string(),
        ))
    }

    fn dataset(&self) -> Option<Arc<dyn Dataset>> {
        self.dataset.read().clone()
    }

    fn add_setup_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.add(listener);
    }
}
