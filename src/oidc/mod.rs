// ABOUTME: OAuth2/OIDC protocol core for the identity server
// ABOUTME: Authorization state machine, consent, token exchange, claims projection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

/// Permanent authorization (consent grant) store
pub mod authorizations;
/// Authorization endpoint state machine and consent handling
pub mod authorize;
/// Claims projection: assembly, scope filtering, token destinations
pub mod claims;
/// Registered client application lookup and validation
pub mod clients;
/// OAuth2/OIDC data models and request/response types
pub mod models;
/// Scope registry with resource resolution and descriptions
pub mod scopes;
/// Token endpoint grant dispatch
pub mod token;
/// Signed token and opaque credential issuance
pub mod tokens;
/// Scope-gated userinfo projection
pub mod userinfo;

pub use authorizations::AuthorizationStore;
pub use authorize::{AuthorizationFlow, AuthorizeOutcome};
pub use claims::{ClaimsProjector, RolePermissions, TokenKind};
pub use clients::ClientRegistry;
pub use models::{
    AuthorizeRequest, Client, ConsentForm, ConsentView, OAuth2Error, ScopeDescription,
    TokenRequest, TokenResponse,
};
pub use scopes::ScopeRegistry;
pub use token::TokenExchange;
pub use tokens::TokenIssuer;
pub use userinfo::UserInfoService;
