// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod base;
pub mod composite;
pub mod export;
pub mod memory_based;
pub mod model_based;
pub mod registry;
pub mod wrapper;

pub use export::{ExportError, ExportHost};
pub use registry::AlgRegistry;
pub use wrapper::{AlgTarget, RecommenderWrapper};
