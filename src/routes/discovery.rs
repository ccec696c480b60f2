// ABOUTME: OIDC discovery document endpoint
// ABOUTME: Serves the well-known configuration for clients and resource servers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use crate::resources::ServerResources;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

/// OIDC discovery routes
pub struct DiscoveryRoutes;

impl DiscoveryRoutes {
    /// Create the discovery route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/.well-known/openid-configuration",
                get(Self::handle_discovery),
            )
            .with_state(resources)
    }

    /// Handle GET /.well-known/openid-configuration
    async fn handle_discovery(State(resources): State<Arc<ServerResources>>) -> Response {
        let issuer = &resources.config.oidc.issuer_url;

        Json(serde_json::json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/connect/authorize"),
            "token_endpoint": format!("{issuer}/connect/token"),
            "userinfo_endpoint": format!("{issuer}/connect/userinfo"),
            "grant_types_supported": ["authorization_code", "client_credentials", "refresh_token"],
            "response_types_supported": ["code"],
            "token_endpoint_auth_methods_supported": ["client_secret_post"],
            "scopes_supported": ["openid", "profile", "email", "roles", "catalog"],
            "response_modes_supported": ["query"],
            "subject_types_supported": ["public"],
            "code_challenge_methods_supported": ["S256"],
            "claims_supported": [
                "sub", "name", "given_name", "family_name", "preferred_username",
                "email", "email_verified", "role", "permission",
                "user_id", "created_at", "last_login_at"
            ]
        }))
        .into_response()
    }
}
