// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`recforge-core`)
//!
//! HTTP surface of exported recommenders. **No ranking logic lives here**;
//! handlers decode the request, call the exported recommender and encode the
//! result.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Axum router served by the export host |
//! | [`wire`] | JSON bodies shared by the router and the remote stub |

pub mod api;
pub mod wire;
