// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use recforge_core::application::export::ExportHost;
use recforge_core::application::wrapper::RecommenderWrapper;
use recforge_core::domain::alg::{Alg, AlgError, AlgKind};
use recforge_core::domain::config::StoreUri;
use recforge_core::domain::kbase::KBaseContext;
use recforge_core::domain::param::RecommendParam;
use recforge_core::domain::rating::RatingVector;
use recforge_core::domain::recommender::Recommender;
use recforge_core::infrastructure::dataset::MemDataset;
use recforge_core::infrastructure::plugins;
use recforge_core::infrastructure::remote_client::RemoteRecommender;
use recforge_core::infrastructure::storage::InMemoryKBaseStorage;
use recforge_core::presentation::wire::HealthResponse;
use std::sync::Arc;
use uuid::Uuid;

fn context() -> KBaseContext {
    KBaseContext::new(Arc::new(InMemoryKBaseStorage::new()), StoreUri::new("/kb"))
}

fn mean_dataset() -> Arc<MemDataset> {
    Arc::new(
        MemDataset::new(1.0, 5.0)
            .with_uri("mem://means")
            .with_user_rating(RatingVector::with_ratings(1, [(10, 5.0)]))
            .with_user_rating(RatingVector::with_ratings(2, [(11, 4.0), (12, 5.0), (13, 2.0)]))
            .with_user_rating(RatingVector::with_ratings(
                3,
                [(11, 5.0), (12, 4.0), (13, 1.0), (14, 3.5)],
            )),
    )
}

#[tokio::test]
async fn test_export_and_unexport_are_idempotent() {
    let host = ExportHost::default();
    let alg = plugins::item_mean(&context());

    let first = host.export(Arc::clone(&alg), 0).await.unwrap();
    let second = host.export(Arc::clone(&alg), 0).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(host.bound_ports(), vec![first.port]);

    let never_exported = plugins::user_knn();
    assert!(!host.unexport(&never_exported).await);

    assert!(host.unexport(&alg).await);
    assert!(!host.unexport(&alg).await);
    assert!(!host.is_exported(&alg));
    assert!(host.bound_ports().is_empty());
}

#[tokio::test]
async fn test_objects_share_an_explicit_port() {
    let host = ExportHost::default();
    let first = host.export(plugins::user_knn(), 0).await.unwrap();
    let second = host
        .export(plugins::item_mean(&context()), first.port)
        .await
        .unwrap();

    assert_eq!(first.port, second.port);
    assert_ne!(first.id, second.id);

    let health: HealthResponse = reqwest::get(format!("http://127.0.0.1:{}/health", first.port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.objects.len(), 2);

    assert_eq!(host.unexport_all().await, 2);
}

#[tokio::test]
async fn test_remote_round_trip_matches_local_ranking() {
    let host = ExportHost::default();
    let alg = plugins::item_mean(&context());
    let handle = host.export(Arc::clone(&alg), 0).await.unwrap();

    let wrapper = RecommenderWrapper::connect(handle.url.clone(), false)
        .await
        .unwrap();
    assert!(wrapper.is_remote());
    assert_eq!(wrapper.kind(), AlgKind::Service);
    assert_eq!(wrapper.name(), "item_mean");

    wrapper.setup(mean_dataset()).await.unwrap();

    let list = wrapper
        .recommend(&RecommendParam::for_user(1), 2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list.item_ids(), vec![11, 12]);

    let estimates = wrapper
        .estimate(&RecommendParam::for_user(1), &[14])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(estimates.get(14), Some(3.5));

    let local = alg
        .recommend(&RecommendParam::for_user(1), 2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(local, list);

    host.unexport_all().await;
}

#[tokio::test]
async fn test_remote_failures_surface_as_remote_errors() {
    let host = ExportHost::default();
    let handle = host.export(plugins::user_knn(), 0).await.unwrap();
    let stub = RemoteRecommender::from_handle(&handle).await.unwrap();

    let err = stub
        .recommend(&RecommendParam::for_user(1), 3)
        .await
        .unwrap_err();
    match err {
        AlgError::Remote(message) => assert!(message.contains("not set up")),
        other => panic!("expected a remote failure, got {other:?}"),
    }

    let missing = format!("http://127.0.0.1:{}/objects/{}", handle.port, Uuid::new_v4());
    assert!(matches!(
        RemoteRecommender::connect(missing).await,
        Err(AlgError::Remote(_))
    ));

    host.unexport_all().await;
}

#[tokio::test]
async fn test_exclusive_wrapper_release_shuts_the_remote_down_once() {
    let host = ExportHost::default();
    let alg = plugins::item_mean(&context());
    let handle = host.export(Arc::clone(&alg), 0).await.unwrap();

    let wrapper = RecommenderWrapper::connect(handle.url.clone(), true)
        .await
        .unwrap();
    wrapper.setup(mean_dataset()).await.unwrap();
    assert!(alg.dataset().is_some());

    wrapper.release().await;
    wrapper.release().await;

    assert!(!host.is_exported(&alg));
    assert!(alg.dataset().is_none());
    assert!(matches!(
        wrapper.recommend(&RecommendParam::for_user(1), 2).await,
        Err(AlgError::Released)
    ));
}

#[tokio::test]
async fn test_shared_wrapper_release_leaves_the_remote_alone() {
    let host = ExportHost::default();
    let alg = plugins::user_knn();
    let handle = host.export(Arc::clone(&alg), 0).await.unwrap();

    let wrapper = RecommenderWrapper::connect(handle.url.clone(), false)
        .await
        .unwrap();
    wrapper.release().await;

    assert!(host.is_exported(&alg));
    host.unexport_all().await;
}

#[tokio::test]
async fn test_remote_new_instance_is_a_new_exported_object() {
    let host = ExportHost::default();
    let handle = host.export(plugins::user_knn(), 0).await.unwrap();
    let wrapper: Arc<dyn Recommender> = Arc::new(
        RecommenderWrapper::connect(handle.url.clone(), false)
            .await
            .unwrap(),
    );

    let instance = wrapper.new_instance().await.unwrap();

    assert!(!Arc::ptr_eq(&wrapper, &instance));
    assert_eq!(instance.name(), "user_knn");
    let handles = host.handles();
    assert_eq!(handles.len(), 2);
    assert!(handles.iter().all(|h| h.port == handle.port));

    drop(instance);
    host.unexport_all().await;
}
