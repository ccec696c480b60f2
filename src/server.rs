// ABOUTME: HTTP server assembly and lifecycle for the identity server
// ABOUTME: Router construction, middleware layering, and the listen loop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use crate::resources::ServerResources;
use crate::routes::{connect::ConnectRoutes, consent::ConsentRoutes, discovery::DiscoveryRoutes};
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// The identity HTTP server
pub struct IdentityServer {
    resources: Arc<ServerResources>,
}

impl IdentityServer {
    /// Create a server over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Build the complete router with middleware layers
    #[must_use]
    pub fn router(&self) -> Router {
        let cors = if self
            .resources
            .config
            .cors_origins
            .iter()
            .any(|o| o == "*")
        {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins = self
                .resources
                .config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse::<http::HeaderValue>().ok())
                .collect::<Vec<_>>();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(ConnectRoutes::routes(self.resources.clone()))
            .merge(ConsentRoutes::routes(self.resources.clone()))
            .merge(DiscoveryRoutes::routes(self.resources.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Serve until the process is terminated
    ///
    /// # Errors
    /// Returns an error if binding or serving fails
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.resources.config.http_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        info!("Identity server listening on {addr}");

        axum::serve(listener, self.router())
            .await
            .context("HTTP server terminated unexpectedly")?;

        Ok(())
    }
}
