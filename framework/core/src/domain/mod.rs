// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: the types and rules every recommender shares, free of
//! transport and storage concerns.

pub mod alg;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod events;
pub mod filter;
pub mod kbase;
pub mod learning;
pub mod param;
pub mod ranking;
pub mod rating;
pub mod recommender;
pub mod storage;
