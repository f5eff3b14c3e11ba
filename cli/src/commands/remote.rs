// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Calls to an exported algorithm through a remote stub
//!
//! Commands: recommend, estimate, info

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use recforge_core::application::wrapper::RecommenderWrapper;
use recforge_core::domain::alg::Alg;
use recforge_core::domain::param::RecommendParam;
use recforge_core::domain::rating::EntityId;
use recforge_core::domain::recommender::Recommender;
use recforge_core::infrastructure::remote_client::RemoteRecommender;

use super::recommend::{print_estimates, print_list};

#[derive(Subcommand)]
pub enum RemoteCommand {
    /// Top-K list from an exported algorithm
    Recommend {
        /// Handle URL printed by `recforge serve`
        #[arg(long)]
        url: String,

        #[arg(long)]
        user: EntityId,

        #[arg(long = "max", default_value_t = 10, allow_negative_numbers = true)]
        max: i32,
    },

    /// Estimated ratings for specific items
    Estimate {
        #[arg(long)]
        url: String,

        #[arg(long)]
        user: EntityId,

        /// Comma separated item ids
        #[arg(long, value_delimiter = ',', required = true)]
        items: Vec<EntityId>,
    },

    /// Name, kind and configuration of an exported algorithm
    Info {
        #[arg(long)]
        url: String,
    },
}

pub async fn handle_command(command: RemoteCommand) -> Result<()> {
    match command {
        RemoteCommand::Recommend { url, user, max } => recommend(url, user, max).await,
        RemoteCommand::Estimate { url, user, items } => estimate(url, user, items).await,
        RemoteCommand::Info { url } => info(url).await,
    }
}

async fn connect(url: &str) -> Result<RecommenderWrapper> {
    RecommenderWrapper::connect(url, false)
        .await
        .with_context(|| format!("Failed to connect to {}", url))
}

async fn recommend(url: String, user: EntityId, max: i32) -> Result<()> {
    let wrapper = connect(&url).await?;
    let list = wrapper
        .recommend(&RecommendParam::for_user(user), max)
        .await
        .context("Remote recommendation failed")?;
    print_list(user, list.as_ref());
    wrapper.release().await;
    Ok(())
}

async fn estimate(url: String, user: EntityId, items: Vec<EntityId>) -> Result<()> {
    let wrapper = connect(&url).await?;
    let estimates = wrapper
        .estimate(&RecommendParam::for_user(user), &items)
        .await
        .context("Remote estimate failed")?;
    print_estimates(user, estimates.as_ref());
    wrapper.release().await;
    Ok(())
}

async fn info(url: String) -> Result<()> {
    let stub = RemoteRecommender::connect(url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;

    println!("{}", "Remote algorithm:".bold());
    println!("  ID: {}", stub.id());
    println!("  Name: {}", stub.name());
    println!("  Kind: {}", stub.remote_kind());
    println!("  URL: {}", stub.url());
    println!();
    println!("{}", "Configuration:".bold());
    let config = serde_json::to_string_pretty(&*stub.config().read())
        .context("Failed to render configuration")?;
    println!("{}", config);

    Ok(())
}
