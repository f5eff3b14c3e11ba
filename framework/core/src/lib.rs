// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # recforge-core
//!
//! Recommendation algorithm framework: configuration, datasets, the ranking
//! engine, knowledge bases, and local/remote execution of recommenders.
//!
//! # Architecture
//!
//! - **domain**: algorithm handles, configuration, datasets, ranking, caching,
//!   knowledge bases and learning control
//! - **application**: local recommender kinds, the registry, export host and
//!   the local/remote wrapper
//! - **infrastructure**: in-memory datasets, knowledge-base storage, the
//!   remote stub, setup event bus and built-in algorithms
//! - **presentation**: HTTP surface and wire bodies of exported recommenders

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
