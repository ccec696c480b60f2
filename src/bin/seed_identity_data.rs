// ABOUTME: Seed binary provisioning default scopes, clients, and the admin user
// ABOUTME: Run once against a fresh database before starting the server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use anyhow::Result;
use clap::Parser;
use ecommershop_identity::{
    config::environment::ServerConfig,
    logging, seed,
    storage::{SqliteStorage, StorageProvider},
};
use tracing::info;

#[derive(Parser)]
#[command(name = "seed-identity-data")]
#[command(about = "Provision default scopes, clients and the admin user")]
pub struct Args {
    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let config = ServerConfig::from_env()?;
    let database_url = args.database_url.unwrap_or(config.database.url);

    let storage = SqliteStorage::new(&database_url).await?;
    storage.migrate().await?;
    seed::seed_default_data(&storage).await?;

    info!("Seed completed for {database_url}");
    Ok(())
}
