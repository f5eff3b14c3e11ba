// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP surface of exported recommenders
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `GET /health` | uptime and exported objects |
//! | `GET /objects/{id}` | name, kind, live and default config |
//! | `PUT /objects/{id}/config` | merge config (read-only keys kept) |
//! | `POST /objects/{id}/setup` | setup on a shipped dataset |
//! | `POST /objects/{id}/unsetup` | unsetup |
//! | `POST /objects/{id}/estimate` | estimate |
//! | `POST /objects/{id}/recommend` | recommend |
//! | `POST /objects/{id}/new_instance` | export a fresh instance on the same port |
//! | `POST /objects/{id}/reset_config` | reset config to defaults |
//! | `DELETE /objects/{id}` | unexport |
//!
//! A router serves one port: objects exported on other ports are answered
//! with 404 and are left out of `/health`.
//!
//! Failures are answered with a status code and `{"error": "..."}`.

use crate::application::export::{ExportError, ExportHost};
use crate::domain::alg::AlgError;
use crate::domain::config::{ConfigError, DataConfig};
use crate::domain::recommender::Recommender;
use crate::presentation::wire::{
    AlgInfo, ErrorBody, EstimateRequest, EstimateResponse, HealthResponse, RecommendRequest,
    RecommendResponse, RemoteHandle, WireDataset,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub host: ExportHost,
    pub port: u16,
}

impl ApiState {
    fn require(&self, id: Uuid) -> Result<Arc<dyn Recommender>, ExportError> {
        self.host.require_on(self.port, id)
    }
}

pub fn router(host: ExportHost, port: u16) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/objects/{id}", get(info_handler).delete(release_handler))
        .route("/objects/{id}/config", put(config_handler))
        .route("/objects/{id}/setup", post(setup_handler))
        .route("/objects/{id}/unsetup", post(unsetup_handler))
        .route("/objects/{id}/estimate", post(estimate_handler))
        .route("/objects/{id}/recommend", post(recommend_handler))
        .route("/objects/{id}/new_instance", post(new_instance_handler))
        .route("/objects/{id}/reset_config", post(reset_config_handler))
        .with_state(ApiState { host, port })
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<AlgError> for ApiError {
    fn from(e: AlgError) -> Self {
        let status = match &e {
            AlgError::NotFound(_) => StatusCode::NOT_FOUND,
            AlgError::InvalidDataset(_) | AlgError::Dataset(_) => StatusCode::BAD_REQUEST,
            AlgError::NotSetup(_) | AlgError::Released | AlgError::Learn(_) => StatusCode::CONFLICT,
            AlgError::Config(ConfigError::ReadOnly(_)) => StatusCode::CONFLICT,
            AlgError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            AlgError::Remote(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        let status = match &e {
            ExportError::NotExported(_) => StatusCode::NOT_FOUND,
            ExportError::Bind { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "Request failed");
        }
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

fn alg_info(id: Uuid, alg: &dyn Recommender) -> AlgInfo {
    let config = alg.config().read().clone();
    AlgInfo {
        id,
        name: alg.name(),
        kind: alg.kind(),
        config,
        default_config: alg.create_default_config(),
    }
}

async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.host.uptime().as_secs(),
        objects: state.host.handles_on(state.port),
    })
}

async fn info_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AlgInfo>, ApiError> {
    let alg = state.require(id)?;
    Ok(Json(alg_info(id, alg.as_ref())))
}

async fn config_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(config): Json<DataConfig>,
) -> Result<Json<AlgInfo>, ApiError> {
    let alg = state.require(id)?;
    alg.config().write().put_all(&config);
    Ok(Json(alg_info(id, alg.as_ref())))
}

async fn setup_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(dataset): Json<WireDataset>,
) -> Result<StatusCode, ApiError> {
    let alg = state.require(id)?;
    alg.setup(dataset.into_dataset()?).await?;
    debug!(alg = %alg.name(), "Remote setup done");
    Ok(StatusCode::NO_CONTENT)
}

async fn unsetup_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let alg = state.require(id)?;
    alg.unsetup().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn estimate_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let alg = state.require(id)?;
    let estimates = alg.estimate(&request.param, &request.item_ids).await?;
    Ok(Json(EstimateResponse { estimates }))
}

async fn recommend_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let alg = state.require(id)?;
    let list = alg.recommend(&request.param, request.max_recommend).await?;
    Ok(Json(RecommendResponse { list }))
}

async fn new_instance_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RemoteHandle>, ApiError> {
    let alg = state.require(id)?;
    let instance = alg.new_instance().await?;
    let handle = state.host.export(instance, state.port).await?;
    Ok(Json(handle))
}

async fn reset_config_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AlgInfo>, ApiError> {
    let alg = state.require(id)?;
    alg.reset_config();
    Ok(Json(alg_info(id, alg.as_ref())))
}

async fn release_handler(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    let released = state.require(id).is_ok() && state.host.unexport_id(id).await;
    if !released {
        debug!(id = %id, port = state.port, "Release of an object that is not exported here");
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::plugins::user_knn;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_object_is_not_found() {
        let app = router(ExportHost::default(), 0);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/objects/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = body_json(response).await;
        assert!(body.error.contains("not exported"));
    }

    #[tokio::test]
    async fn test_recommend_before_setup_is_conflict() {
        let host = ExportHost::default();
        let handle = host.export(user_knn(), 0).await.unwrap();
        let request = RecommendRequest {
            param: crate::domain::param::RecommendParam::for_user(1),
            max_recommend: 3,
        };

        let response = router(host.clone(), handle.port)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/objects/{}/recommend", handle.id))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&request).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        host.unexport_all().await;
    }

    #[tokio::test]
    async fn test_health_lists_exported_objects() {
        let host = ExportHost::default();
        let handle = host.export(user_knn(), 0).await.unwrap();

        let response = router(host.clone(), handle.port)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = body_json(response).await;
        assert_eq!(health.objects, vec![handle]);
        host.unexport_all().await;
    }

    #[tokio::test]
    async fn test_router_only_serves_its_own_port() {
        let host = ExportHost::default();
        let first = host.export(user_knn(), 0).await.unwrap();
        let second = host.export(user_knn(), 0).await.unwrap();
        assert_ne!(first.port, second.port);

        let response = router(host.clone(), second.port)
            .oneshot(
                Request::builder()
                    .uri(format!("/objects/{}", first.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router(host.clone(), second.port)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/objects/{}", first.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(host.require(first.id).is_ok());

        let response = router(host.clone(), second.port)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let health: HealthResponse = body_json(response).await;
        assert_eq!(health.objects, vec![second]);

        host.unexport_all().await;
    }
}
