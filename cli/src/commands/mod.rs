// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the recforge CLI

pub mod config;
pub mod list;
pub mod recommend;
pub mod remote;
pub mod serve;

pub use self::config::ConfigCommand;
pub use self::recommend::RecommendArgs;
pub use self::remote::RemoteCommand;
pub use self::serve::ServeArgs;

use recforge_core::application::registry::AlgRegistry;
use recforge_core::domain::config::StoreUri;
use recforge_core::domain::kbase::KBaseContext;
use recforge_core::infrastructure::plugins;
use recforge_core::infrastructure::storage::InMemoryKBaseStorage;
use std::sync::Arc;

/// Registry of the built-in algorithms over `context`
pub fn builtin_registry(context: &KBaseContext) -> AlgRegistry {
    let registry = AlgRegistry::new();
    plugins::register_builtin(&registry, context);
    registry
}

/// Knowledge-base context that keeps nothing past the process
pub fn scratch_context() -> KBaseContext {
    KBaseContext::new(Arc::new(InMemoryKBaseStorage::new()), StoreUri::new("/kb"))
}
