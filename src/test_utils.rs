// ABOUTME: Test utilities for creating users, clients, and storage in a consistent way
// ABOUTME: Centralizes test fixtures to avoid duplication across integration tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use crate::config::environment::OidcServerConfig;
use crate::models::User;
use crate::oidc::claims::{ClaimsProjector, RolePermissions};
use crate::oidc::clients::ClientRegistry;
use crate::oidc::models::{Client, ClientType, ConsentType};
use crate::oidc::{AuthorizationFlow, TokenExchange, TokenIssuer, UserInfoService};
use crate::storage::{SqliteStorage, StorageProvider};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// OIDC server configuration used across tests
#[must_use]
pub fn test_oidc_config() -> OidcServerConfig {
    OidcServerConfig {
        issuer_url: "http://localhost:8084".to_owned(),
        signing_secret: "test-signing-secret".to_owned(),
        access_token_ttl_secs: 3600,
        identity_token_ttl_secs: 1200,
        refresh_token_ttl_days: 14,
        auth_code_ttl_secs: 600,
    }
}

/// The protocol services wired over one in-memory storage
pub struct TestHarness {
    pub storage: Arc<SqliteStorage>,
    pub issuer: Arc<TokenIssuer>,
    pub projector: Arc<ClaimsProjector>,
    pub flow: AuthorizationFlow,
    pub exchange: TokenExchange,
    pub userinfo: UserInfoService,
}

/// Build a harness over a fresh in-memory storage
///
/// # Panics
/// Panics when the in-memory database cannot be opened
pub async fn create_test_harness() -> TestHarness {
    let storage = Arc::new(create_test_storage().await);
    let storage_dyn: Arc<dyn StorageProvider> = storage.clone();
    let issuer = Arc::new(TokenIssuer::new(test_oidc_config()));
    let projector = Arc::new(ClaimsProjector::new(RolePermissions::default()));

    TestHarness {
        flow: AuthorizationFlow::new(storage_dyn.clone(), issuer.clone()),
        exchange: TokenExchange::new(storage_dyn.clone(), issuer.clone(), projector.clone()),
        userinfo: UserInfoService::new(storage_dyn, issuer.clone(), projector.clone()),
        storage,
        issuer,
        projector,
    }
}

/// Open and migrate an in-memory SQLite storage
///
/// # Panics
/// Panics when the in-memory database cannot be opened
pub async fn create_test_storage() -> SqliteStorage {
    let storage = SqliteStorage::new("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    storage.migrate().await.expect("schema migration");
    storage
}

/// Create a test user with the given roles
#[must_use]
pub fn create_test_user(email: &str, roles: &[&str]) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_owned(),
        email_verified: true,
        username: email.to_owned(),
        first_name: Some("Test".to_owned()),
        last_name: Some("User".to_owned()),
        password_hash: "test_password_hash".to_owned(),
        security_stamp: Uuid::new_v4().to_string(),
        is_active: true,
        lockout_end: None,
        roles: roles.iter().map(|r| (*r).to_owned()).collect(),
        extra_claims: vec![],
        created_at: Utc::now(),
        last_login_at: None,
    }
}

/// Create a confidential test client
///
/// # Panics
/// Panics when secret hashing fails
#[must_use]
pub fn create_test_client(
    client_id: &str,
    secret: &str,
    consent_type: ConsentType,
    allowed_scopes: &[&str],
) -> Client {
    Client {
        id: Uuid::new_v4().to_string(),
        client_id: client_id.to_owned(),
        client_secret_hash: Some(
            ClientRegistry::hash_client_secret(secret).expect("secret hashing"),
        ),
        client_type: ClientType::Confidential,
        display_name: format!("{client_id} application"),
        redirect_uris: vec!["https://localhost:7001/signin-oidc".to_owned()],
        post_logout_redirect_uris: vec![],
        consent_type,
        allowed_scopes: allowed_scopes.iter().map(|s| (*s).to_owned()).collect(),
        allowed_grant_types: vec![
            "authorization_code".to_owned(),
            "refresh_token".to_owned(),
            "client_credentials".to_owned(),
        ],
        requires_pkce: false,
        created_at: Utc::now(),
    }
}

/// Create a public test client requiring PKCE
#[must_use]
pub fn create_test_public_client(client_id: &str, allowed_scopes: &[&str]) -> Client {
    Client {
        id: Uuid::new_v4().to_string(),
        client_id: client_id.to_owned(),
        client_secret_hash: None,
        client_type: ClientType::Public,
        display_name: format!("{client_id} application"),
        redirect_uris: vec!["com.ecommershop.mobile://callback".to_owned()],
        post_logout_redirect_uris: vec![],
        consent_type: ConsentType::Explicit,
        allowed_scopes: allowed_scopes.iter().map(|s| (*s).to_owned()).collect(),
        allowed_grant_types: vec![
            "authorization_code".to_owned(),
            "refresh_token".to_owned(),
        ],
        requires_pkce: true,
        created_at: Utc::now(),
    }
}

/// Store a user, panicking on failure
pub async fn store_user(storage: &SqliteStorage, user: &User) {
    storage.create_user(user).await.expect("store user");
}

/// Store a client, panicking on failure
pub async fn store_client(storage: &SqliteStorage, client: &Client) {
    storage.store_client(client).await.expect("store client");
}
