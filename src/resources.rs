// ABOUTME: Centralized resource container for dependency injection
// ABOUTME: Manages shared resources like storage, session manager, and protocol services
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

//! # Server Resources Module
//!
//! Centralized resource container for dependency injection. Expensive shared
//! objects are built once here and Arc-shared into the route handlers.

use crate::auth::SessionManager;
use crate::config::environment::ServerConfig;
use crate::oidc::claims::{ClaimsProjector, RolePermissions};
use crate::oidc::{AuthorizationFlow, TokenExchange, TokenIssuer, UserInfoService};
use crate::storage::StorageProvider;
use std::sync::Arc;

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    pub storage: Arc<dyn StorageProvider>,
    pub session_manager: Arc<SessionManager>,
    pub token_issuer: Arc<TokenIssuer>,
    pub claims_projector: Arc<ClaimsProjector>,
    pub authorization_flow: Arc<AuthorizationFlow>,
    pub token_exchange: Arc<TokenExchange>,
    pub userinfo: Arc<UserInfoService>,
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Create new server resources with proper Arc sharing
    #[must_use]
    pub fn new(storage: Arc<dyn StorageProvider>, config: Arc<ServerConfig>) -> Self {
        let session_manager = Arc::new(SessionManager::new(config.session.clone()));
        let token_issuer = Arc::new(TokenIssuer::new(config.oidc.clone()));
        let claims_projector = Arc::new(ClaimsProjector::new(RolePermissions::default()));

        let authorization_flow = Arc::new(AuthorizationFlow::new(
            storage.clone(),
            token_issuer.clone(),
        ));
        let token_exchange = Arc::new(TokenExchange::new(
            storage.clone(),
            token_issuer.clone(),
            claims_projector.clone(),
        ));
        let userinfo = Arc::new(UserInfoService::new(
            storage.clone(),
            token_issuer.clone(),
            claims_projector.clone(),
        ));

        Self {
            storage,
            session_manager,
            token_issuer,
            claims_projector,
            authorization_flow,
            token_exchange,
            userinfo,
            config,
        }
    }
}
