// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `recforge recommend`: set up one algorithm in process and rank for a user

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use recforge_core::domain::alg::Alg;
use recforge_core::domain::param::RecommendParam;
use recforge_core::domain::ranking::RecommendList;
use recforge_core::domain::rating::{EntityId, RatingVector};
use recforge_core::domain::recommender::Recommender;

use super::{builtin_registry, scratch_context};
use crate::manifest::load_dataset_file;

#[derive(Args)]
pub struct RecommendArgs {
    /// Algorithm name (see `recforge list`)
    #[arg(long = "alg")]
    pub alg: String,

    /// Dataset snapshot (JSON)
    #[arg(long, value_name = "FILE")]
    pub dataset: PathBuf,

    /// User to recommend for
    #[arg(long)]
    pub user: EntityId,

    /// List size; zero or negative returns every relevant item
    #[arg(long = "max", default_value_t = 10, allow_negative_numbers = true)]
    pub max: i32,

    /// Config override, `key=value` (value parsed as JSON when possible)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

pub async fn run(args: RecommendArgs) -> Result<()> {
    let registry = builtin_registry(&scratch_context());
    let alg = registry
        .get(&args.alg)
        .await
        .with_context(|| format!("Failed to create algorithm '{}'", args.alg))?;

    for assignment in &args.set {
        let (key, value) = parse_assignment(assignment)?;
        alg.config()
            .write()
            .put(key, value)
            .with_context(|| format!("Failed to apply '{}'", assignment))?;
    }

    let dataset = Arc::new(load_dataset_file(&args.dataset)?);
    alg.setup(dataset)
        .await
        .with_context(|| format!("Failed to set up '{}'", args.alg))?;

    let list = alg
        .recommend(&RecommendParam::for_user(args.user), args.max)
        .await
        .context("Recommendation failed")?;
    print_list(args.user, list.as_ref());

    alg.unsetup().await.context("Failed to unset up")?;
    Ok(())
}

/// `key=value`, with the value read as JSON and kept as a string otherwise
pub fn parse_assignment(assignment: &str) -> Result<(String, serde_json::Value)> {
    let (key, raw) = assignment
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got '{}'", assignment))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Empty key in '{}'", assignment);
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::from(raw));
    Ok((key.to_string(), value))
}

pub fn print_list(user_id: EntityId, list: Option<&RecommendList>) {
    match list {
        Some(list) if !list.is_empty() => {
            println!("{}", format!("Recommendations for user {}:", user_id).bold());
            for (rank, pair) in list.items.iter().enumerate() {
                println!("  {:>3}. item {:<8} {:.4}", rank + 1, pair.key, pair.value);
            }
        }
        _ => println!("{}", format!("No recommendations for user {}", user_id).yellow()),
    }
}

pub fn print_estimates(user_id: EntityId, estimates: Option<&RatingVector>) {
    match estimates {
        Some(vector) if !vector.is_empty() => {
            println!("{}", format!("Estimates for user {}:", user_id).bold());
            for (item_id, value) in vector.iter() {
                println!("  item {:<8} {:.4}", item_id, value);
            }
        }
        _ => println!("{}", format!("No estimates for user {}", user_id).yellow()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment_reads_json_values() {
        let (key, value) = parse_assignment("neighbors=10").unwrap();
        assert_eq!(key, "neighbors");
        assert_eq!(value, serde_json::json!(10));

        let (_, value) = parse_assignment("reserved_recommend=true").unwrap();
        assert_eq!(value, serde_json::json!(true));

        let (_, value) = parse_assignment("label=plain text").unwrap();
        assert_eq!(value, serde_json::json!("plain text"));
    }

    #[test]
    fn test_parse_assignment_requires_a_key() {
        assert!(parse_assignment("no-equals").is_err());
        assert!(parse_assignment("=5").is_err());
    }
}
