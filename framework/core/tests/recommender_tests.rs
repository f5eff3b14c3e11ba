// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use recforge_core::application::registry::AlgRegistry;
use recforge_core::domain::alg::{Alg, AlgError, AlgKind};
use recforge_core::domain::config::{StoreUri, MIN_RATING_FIELD, RESERVED_RECOMMEND_FIELD};
use recforge_core::domain::dataset::Dataset;
use recforge_core::domain::filter::ExcludeItemsFilter;
use recforge_core::domain::kbase::KBaseContext;
use recforge_core::domain::param::RecommendParam;
use recforge_core::domain::rating::RatingVector;
use recforge_core::domain::recommender::Recommender;
use recforge_core::infrastructure::dataset::MemDataset;
use recforge_core::infrastructure::plugins::{self, ITEM_MEAN_NAME, MEAN_COMPOSITE_NAME, USER_KNN_NAME};
use recforge_core::infrastructure::storage::InMemoryKBaseStorage;
use std::sync::Arc;

fn context() -> KBaseContext {
    KBaseContext::new(Arc::new(InMemoryKBaseStorage::new()), StoreUri::new("/kb"))
}

/// Item means: 10 → 5.0, 11 → 4.5, 12 → 4.5, 13 → 1.5, 14 → 3.5
fn mean_dataset() -> Arc<dyn Dataset> {
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

/// User 2 agrees with user 1 exactly; user 3 is the opposite taste
fn neighbour_dataset() -> Arc<dyn Dataset> {
    Arc::new(
        MemDataset::new(1.0, 5.0)
            .with_uri("mem://neighbours")
            .with_user_rating(RatingVector::with_ratings(1, [(10, 5.0), (11, 4.0), (12, 1.0)]))
            .with_user_rating(RatingVector::with_ratings(
                2,
                [(10, 5.0), (11, 4.0), (12, 1.0), (13, 5.0), (14, 1.0)],
            ))
            .with_user_rating(RatingVector::with_ratings(
                3,
                [(10, 1.0), (11, 2.0), (12, 5.0), (13, 1.0), (14, 5.0)],
            )),
    )
}

#[tokio::test]
async fn test_model_based_top_k_keeps_scan_order_on_ties() {
    let alg = plugins::item_mean(&context());
    alg.setup(mean_dataset()).await.unwrap();

    let list = alg
        .recommend(&RecommendParam::for_user(1), 2)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(list.user_id, 1);
    assert_eq!(list.item_ids(), vec![11, 12]);
    assert_eq!(list.items[0].value, 4.5);
}

#[tokio::test]
async fn test_non_positive_k_returns_every_relevant_item() {
    let alg = plugins::item_mean(&context());
    alg.setup(mean_dataset()).await.unwrap();

    for k in [0, -3] {
        let list = alg
            .recommend(&RecommendParam::for_user(1), k)
            .await
            .unwrap()
            .unwrap();
        // 13 (1.5) is below the midpoint of the 1..5 scale
        assert_eq!(list.item_ids(), vec![11, 12, 14]);
    }
}

#[tokio::test]
async fn test_reserved_mode_ranks_the_low_side() {
    let alg = plugins::item_mean(&context());
    alg.config().write().put(RESERVED_RECOMMEND_FIELD, true).unwrap();
    alg.setup(mean_dataset()).await.unwrap();

    let list = alg
        .recommend(&RecommendParam::for_user(1), 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list.item_ids(), vec![13]);
}

#[tokio::test]
async fn test_filters_exclude_candidates() {
    let alg = plugins::item_mean(&context());
    alg.setup(mean_dataset()).await.unwrap();
    alg.add_filter(Arc::new(ExcludeItemsFilter::new([11])))
        .unwrap();

    let list = alg
        .recommend(&RecommendParam::for_user(1), 2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list.item_ids(), vec![12, 14]);
}

#[tokio::test]
async fn test_estimate_skips_unknown_items() {
    let alg = plugins::item_mean(&context());
    alg.setup(mean_dataset()).await.unwrap();

    let estimates = alg
        .estimate(&RecommendParam::for_user(1), &[12, 13, 99])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(estimates.get(12), Some(4.5));
    assert_eq!(estimates.get(13), Some(1.5));
    assert_eq!(estimates.get(99), None);
}

#[tokio::test]
async fn test_unknown_user_without_ratings_has_no_result() {
    let alg = plugins::item_mean(&context());
    alg.setup(mean_dataset()).await.unwrap();

    let list = alg.recommend(&RecommendParam::for_user(42), 3).await.unwrap();
    assert!(list.is_none());
}

#[tokio::test]
async fn test_caller_ratings_are_kept_for_unknown_users() {
    let alg = plugins::item_mean(&context());
    alg.setup(mean_dataset()).await.unwrap();

    let param = RecommendParam::from_vector(RatingVector::with_ratings(42, [(11, 3.0), (12, 3.0)]));
    let list = alg.recommend(&param, 0).await.unwrap().unwrap();
    assert_eq!(list.item_ids(), vec![10, 14]);
}

#[tokio::test]
async fn test_memory_based_neighbours_drive_the_ranking() {
    let alg = plugins::user_knn();
    alg.setup(neighbour_dataset()).await.unwrap();

    let estimates = alg
        .estimate(&RecommendParam::for_user(1), &[13, 14])
        .await
        .unwrap()
        .unwrap();
    let liked = estimates.get(13).unwrap();
    let disliked = estimates.get(14).unwrap();
    assert!(liked > 3.0 && liked <= 5.0);
    assert!(disliked < 3.0 && disliked >= 1.0);

    let list = alg
        .recommend(&RecommendParam::for_user(1), 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list.item_ids(), vec![13]);
}

#[tokio::test]
async fn test_memory_based_setup_locks_rating_bounds() {
    let alg = plugins::user_knn();
    alg.setup(neighbour_dataset()).await.unwrap();

    let err = alg.config().write().put(MIN_RATING_FIELD, 0.0).unwrap_err();
    assert!(err.to_string().contains(MIN_RATING_FIELD));

    alg.unsetup().await.unwrap();
    alg.config().write().put(MIN_RATING_FIELD, 0.0).unwrap();
}

#[tokio::test]
async fn test_not_setup_behaviour_per_kind() {
    let param = RecommendParam::for_user(1);

    let knn = plugins::user_knn();
    assert!(matches!(knn.recommend(&param, 3).await, Err(AlgError::NotSetup(_))));

    let mean = plugins::item_mean(&context());
    assert!(mean.recommend(&param, 3).await.unwrap().is_none());

    let composite = plugins::mean_composite(&context());
    assert!(matches!(composite.recommend(&param, 3).await, Err(AlgError::NotSetup(_))));
}

#[tokio::test]
async fn test_composite_averages_inner_estimates() {
    let composite = plugins::mean_composite(&context());
    composite.setup(neighbour_dataset()).await.unwrap();

    let knn = plugins::user_knn();
    knn.setup(neighbour_dataset()).await.unwrap();
    let mean = plugins::item_mean(&context());
    mean.setup(neighbour_dataset()).await.unwrap();

    let param = RecommendParam::for_user(1);
    let combined = composite.estimate(&param, &[13]).await.unwrap().unwrap();
    let a = knn.estimate(&param, &[13]).await.unwrap().unwrap().get(13).unwrap();
    let b = mean.estimate(&param, &[13]).await.unwrap().unwrap().get(13).unwrap();

    let value = combined.get(13).unwrap();
    assert!((value - (a + b) / 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_registry_hands_out_fresh_instances() {
    let registry = AlgRegistry::new();
    plugins::register_builtin(&registry, &context());

    assert_eq!(
        registry.names(),
        vec![
            ITEM_MEAN_NAME.to_string(),
            MEAN_COMPOSITE_NAME.to_string(),
            USER_KNN_NAME.to_string()
        ]
    );
    assert!(registry
        .kinds()
        .contains(&(MEAN_COMPOSITE_NAME.to_string(), AlgKind::Composite)));

    let first = registry.get(USER_KNN_NAME).await.unwrap();
    let second = registry.get(USER_KNN_NAME).await.unwrap();
    assert!(!Arc::ptr_eq(&first.config(), &second.config()));

    assert!(matches!(registry.get("missing").await, Err(AlgError::NotFound(_))));
}

#[tokio::test]
async fn test_reset_config_restores_defaults_in_place() {
    let alg = plugins::item_mean(&context());
    let held = alg.config();
    held.write().put("custom", 7).unwrap();

    alg.reset_config();

    assert!(Arc::ptr_eq(&held, &alg.config()));
    assert!(held.read().get("custom").is_none());
    assert!(held.read().store_uri().is_some());
}
