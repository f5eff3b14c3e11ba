// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use recforge_core::application::composite::CompositeRecommender;
use recforge_core::application::model_based::ModelBasedRecommender;
use recforge_core::domain::alg::{Alg, AlgError};
use recforge_core::domain::config::{StoreUri, DATASOURCE_URI_FIELD, KBASE_NAME_FIELD};
use recforge_core::domain::dataset::{Dataset, DatasetPointer};
use recforge_core::domain::events::SetupEventKind;
use recforge_core::domain::kbase::{KBaseContext, KBaseError};
use recforge_core::domain::learning::LearnState;
use recforge_core::domain::param::RecommendParam;
use recforge_core::domain::rating::RatingVector;
use recforge_core::domain::recommender::Recommender;
use recforge_core::domain::storage::{KBaseStorage, StorageError};
use recforge_core::infrastructure::dataset::{MemDataset, MemDatasetCatalog};
use recforge_core::infrastructure::event_bus::SetupEventBus;
use recforge_core::infrastructure::plugins::item_mean::LEARN_STEP_DELAY_FIELD;
use recforge_core::infrastructure::plugins::{self, ItemMean};
use recforge_core::infrastructure::storage::{InMemoryKBaseStorage, LocalKBaseStorage};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

type ItemMeanRecommender = ModelBasedRecommender<ItemMean>;

fn local_context(dir: &TempDir) -> KBaseContext {
    KBaseContext::new(
        Arc::new(LocalKBaseStorage::new(dir.path()).unwrap()),
        StoreUri::new("/kb"),
    )
    .with_fixed_store(true)
}

/// Storage that accepts everything except artifact writes
#[derive(Default)]
struct FullDiskStorage {
    inner: InMemoryKBaseStorage,
}

#[async_trait]
impl KBaseStorage for FullDiskStorage {
    async fn exists(&self, uri: &StoreUri) -> Result<bool, StorageError> {
        self.inner.exists(uri).await
    }

    async fn create_dir(&self, uri: &StoreUri) -> Result<(), StorageError> {
        self.inner.create_dir(uri).await
    }

    async fn clear_content(&self, uri: &StoreUri, name_prefix: &str) -> Result<usize, StorageError> {
        self.inner.clear_content(uri, name_prefix).await
    }

    async fn read(&self, uri: &StoreUri) -> Result<Vec<u8>, StorageError> {
        self.inner.read(uri).await
    }

    async fn write(&self, _uri: &StoreUri, _bytes: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk full".to_string()))
    }
}

fn full_disk_context() -> KBaseContext {
    KBaseContext::new(Arc::new(FullDiskStorage::default()), StoreUri::new("/kb"))
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

fn slow(alg: &ItemMeanRecommender, millis: i64) {
    alg.config()
        .write()
        .put(LEARN_STEP_DELAY_FIELD, millis)
        .unwrap();
}

#[tokio::test]
async fn test_setup_learns_and_persists_next_to_config() {
    let dir = TempDir::new().unwrap();
    let alg = ItemMeanRecommender::new(local_context(&dir));

    alg.setup(mean_dataset()).await.unwrap();

    let store = dir.path().join("kb").join("item_mean");
    assert!(store.join("item_mean_config.json").exists());
    assert!(store.join("item_mean_model.json").exists());
    assert!(!alg.kbase().is_empty());
    assert_eq!(
        alg.config().read().get_as_str(KBASE_NAME_FIELD),
        Some("item_mean")
    );
}

#[tokio::test]
async fn test_kbase_pointer_loads_saved_knowledge_in_a_fresh_instance() {
    let dir = TempDir::new().unwrap();
    let learner = ItemMeanRecommender::new(local_context(&dir));
    learner.setup(mean_dataset()).await.unwrap();

    let catalog = Arc::new(MemDatasetCatalog::new());
    catalog.register(mean_dataset()).unwrap();
    let loader = ItemMeanRecommender::new(local_context(&dir).with_resolver(catalog));

    let pointer: Arc<dyn Dataset> =
        Arc::new(DatasetPointer::kbase(Some(&StoreUri::new("/kb/item_mean"))));
    loader.setup(Arc::clone(&pointer)).await.unwrap();

    assert_eq!(
        pointer.config().read().get_as_str(KBASE_NAME_FIELD),
        Some("item_mean")
    );
    let list = loader
        .recommend(&RecommendParam::for_user(1), 2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list.item_ids(), vec![11, 12]);
}

#[tokio::test]
async fn test_load_without_resolver_still_ranks_caller_ratings() {
    let dir = TempDir::new().unwrap();
    ItemMeanRecommender::new(local_context(&dir))
        .setup(mean_dataset())
        .await
        .unwrap();

    let loader = ItemMeanRecommender::new(local_context(&dir));
    loader
        .setup(Arc::new(DatasetPointer::kbase(None)))
        .await
        .unwrap();

    let param = RecommendParam::from_vector(RatingVector::with_ratings(1, [(10, 5.0)]));
    let list = loader.recommend(&param, 2).await.unwrap().unwrap();
    assert_eq!(list.item_ids(), vec![11, 12]);
}

#[tokio::test]
async fn test_clear_deletes_artifacts_but_close_does_not() {
    let dir = TempDir::new().unwrap();
    let alg = ItemMeanRecommender::new(local_context(&dir));
    alg.setup(mean_dataset()).await.unwrap();
    let config_file = dir.path().join("kb/item_mean/item_mean_config.json");

    alg.kbase().close().await;
    assert!(alg.kbase().is_empty());
    assert!(config_file.exists());

    alg.kbase().load().await.unwrap();
    alg.kbase().clear().await.unwrap();
    assert!(alg.kbase().is_empty());
    assert!(!config_file.exists());

    let loader = ItemMeanRecommender::new(local_context(&dir));
    let err = loader
        .setup(Arc::new(DatasetPointer::kbase(None)))
        .await
        .unwrap_err();
    assert!(matches!(err, AlgError::KBase(KBaseError::NotFound(_))));
}

#[tokio::test]
async fn test_new_kbase_leaves_own_kbase_untouched() {
    let dir = TempDir::new().unwrap();
    let alg = ItemMeanRecommender::new(local_context(&dir));

    let kb = alg.new_kbase(mean_dataset()).await.unwrap();

    assert!(!kb.is_empty());
    assert!(alg.kbase().is_empty());
    assert!(!Arc::ptr_eq(&kb.config(), &alg.config()));
    assert!(alg.config().read().get(KBASE_NAME_FIELD).is_none());
}

#[tokio::test]
async fn test_learning_reports_progress_then_done() {
    let dir = TempDir::new().unwrap();
    let alg = ItemMeanRecommender::new(local_context(&dir));
    let bus = SetupEventBus::new(64);
    let mut receiver = bus.subscribe();
    alg.add_setup_listener(Arc::new(bus.clone()));

    alg.setup(mean_dataset()).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    let doing: Vec<_> = events
        .iter()
        .filter(|e| e.kind == SetupEventKind::Doing)
        .collect();
    assert_eq!(doing.len(), 5);
    assert_eq!(doing.last().map(|e| (e.progress_step, e.progress_total)), Some((5, 5)));
    assert_eq!(events.last().map(|e| e.kind), Some(SetupEventKind::Done));
}

#[tokio::test]
async fn test_pause_blocks_until_resume() {
    let dir = TempDir::new().unwrap();
    let alg = Arc::new(ItemMeanRecommender::new(local_context(&dir)));
    slow(&alg, 30);
    let control = alg.learn_control().unwrap();
    let mut state = control.subscribe();

    let learner = {
        let alg = Arc::clone(&alg);
        tokio::spawn(async move { alg.setup(mean_dataset()).await })
    };
    state.wait_for(|s| *s == LearnState::Running).await.unwrap();

    let pauser = {
        let control = control.clone();
        tokio::spawn(async move { control.learn_pause().await })
    };
    state.wait_for(|s| *s == LearnState::Paused).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pauser.is_finished());
    assert!(!learner.is_finished());

    control.learn_resume().unwrap();
    timeout(Duration::from_secs(5), pauser)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(5), learner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(alg.kbase().model().await.len(), 5);
}

#[tokio::test]
async fn test_stop_keeps_partial_knowledge() {
    let dir = TempDir::new().unwrap();
    let alg = Arc::new(ItemMeanRecommender::new(local_context(&dir)));
    slow(&alg, 50);
    let control = alg.learn_control().unwrap();
    let mut state = control.subscribe();

    let learner = {
        let alg = Arc::clone(&alg);
        tokio::spawn(async move { alg.setup(mean_dataset()).await })
    };
    state.wait_for(|s| *s == LearnState::Running).await.unwrap();

    control.learn_stop().await.unwrap();
    assert_eq!(control.state(), LearnState::Stopped);
    timeout(Duration::from_secs(5), learner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(!alg.kbase().is_empty());
    assert!(alg.kbase().model().await.len() < 5);
}

#[tokio::test]
async fn test_failed_save_rolls_setup_back() {
    let alg = ItemMeanRecommender::new(full_disk_context());

    assert!(alg.setup(mean_dataset()).await.is_err());

    assert!(alg.kbase().is_empty());
    assert!(alg.dataset().is_none());
    assert!(alg.kbase().datasource_dataset().await.is_none());
    {
        let config = alg.config();
        let config = config.read();
        assert!(config.get(KBASE_NAME_FIELD).is_none());
        assert!(config.get(DATASOURCE_URI_FIELD).is_none());
    }
    let result = alg.recommend(&RecommendParam::for_user(1), 2).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_failed_inner_setup_rolls_composite_back() {
    let context = full_disk_context();
    let composite = CompositeRecommender::new(
        plugins::MEAN_COMPOSITE_NAME,
        vec![plugins::user_knn(), plugins::item_mean(&context)],
    );

    assert!(composite.setup(mean_dataset()).await.is_err());

    assert!(composite.dataset().is_none());
    for inner in composite.inner() {
        assert!(inner.dataset().is_none(), "{} kept its dataset", inner.name());
    }
    let param = RecommendParam::for_user(1);
    assert!(matches!(
        composite.recommend(&param, 2).await,
        Err(AlgError::NotSetup(_))
    ));
    assert!(matches!(
        composite.inner()[0].recommend(&param, 2).await,
        Err(AlgError::NotSetup(_))
    ));
    assert!(composite.inner()[1].recommend(&param, 2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_recommend_waits_for_slow_setup() {
    let dir = TempDir::new().unwrap();
    let alg = Arc::new(ItemMeanRecommender::new(local_context(&dir)));
    slow(&alg, 30);
    let control = alg.learn_control().unwrap();
    let mut state = control.subscribe();

    let learner = {
        let alg = Arc::clone(&alg);
        tokio::spawn(async move { alg.setup(mean_dataset()).await })
    };
    state.wait_for(|s| *s == LearnState::Running).await.unwrap();

    let reader = {
        let alg = Arc::clone(&alg);
        tokio::spawn(async move {
            let list = alg.recommend(&RecommendParam::for_user(1), 2).await;
            let learned = alg.kbase().model().await.len();
            (list, learned)
        })
    };
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(!reader.is_finished());

    timeout(Duration::from_secs(5), learner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let (list, learned) = timeout(Duration::from_secs(5), reader)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(list.unwrap().unwrap().item_ids(), vec![11, 12]);
    assert_eq!(learned, 5);
}
