// ABOUTME: Server binary for the Ecommershop identity platform
// ABOUTME: Loads configuration, prepares storage, and serves the OIDC endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

//! # Identity Server Binary
//!
//! Starts the OAuth2/OIDC authorization server with environment-based
//! configuration, schema migration, and optional seed provisioning.

use anyhow::Result;
use clap::Parser;
use ecommershop_identity::{
    config::environment::ServerConfig,
    logging,
    resources::ServerResources,
    seed,
    server::IdentityServer,
    storage::{SqliteStorage, StorageProvider},
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "identity-server")]
#[command(about = "Ecommershop Identity - OAuth2/OIDC authorization server")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Provision default scopes, clients and the admin user at startup
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Ecommershop Identity Server");
    info!("{}", config.summary());

    let storage = SqliteStorage::new(&config.database.url).await?;
    if config.database.auto_migrate {
        storage.migrate().await?;
        info!("Database schema migrated");
    }

    if args.seed {
        seed::seed_default_data(&storage).await?;
    }

    let resources = Arc::new(ServerResources::new(
        Arc::new(storage),
        Arc::new(config),
    ));

    IdentityServer::new(resources).run().await
}
