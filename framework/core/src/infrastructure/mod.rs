// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod dataset;
pub mod event_bus;
pub mod plugins;
pub mod remote_client;
pub mod storage;

pub use dataset::{MemDataset, MemDatasetCatalog};
pub use event_bus::SetupEventBus;
pub use remote_client::RemoteRecommender;
