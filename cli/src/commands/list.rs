// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `recforge list`

use anyhow::Result;
use colored::Colorize;

use super::{builtin_registry, scratch_context};

pub async fn run() -> Result<()> {
    let registry = builtin_registry(&scratch_context());

    println!("{}", "Registered algorithms:".bold());
    for (name, kind) in registry.kinds() {
        println!("  {} ({})", name.bold(), kind);
    }

    Ok(())
}
