// ABOUTME: Storage abstraction layer for the identity server
// ABOUTME: Defines the StorageProvider trait implemented by the SQLite backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use crate::models::User;
use crate::oidc::models::{AuthCodeRecord, Authorization, Client, RefreshTokenRecord, Scope};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod sqlite;

pub use sqlite::SqliteStorage;

/// Core storage abstraction trait
///
/// All storage implementations must implement this trait to provide a
/// consistent interface for the protocol core. External I/O may block or
/// suspend; every request-handling path goes through these methods and
/// carries no other shared mutable state.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Run schema migration to set up tables
    async fn migrate(&self) -> Result<()>;

    // ================================
    // User Store
    // ================================

    /// Create a new user account
    async fn create_user(&self, user: &User) -> Result<Uuid>;

    /// Get user by ID
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Get user by email address
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Record a successful interactive login
    async fn update_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    // ================================
    // Client Registry
    // ================================

    /// Store a client application
    async fn store_client(&self, client: &Client) -> Result<()>;

    /// Get a client by `client_id`; `None` when unknown
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>>;

    // ================================
    // Scope Registry
    // ================================

    /// Store a scope definition
    async fn store_scope(&self, scope: &Scope) -> Result<()>;

    /// Get a scope by name
    async fn get_scope(&self, name: &str) -> Result<Option<Scope>>;

    /// List all registered scopes
    async fn list_scopes(&self) -> Result<Vec<Scope>>;

    // ================================
    // Authorization Store
    // ================================

    /// List valid permanent authorizations for a (subject, client) pair
    async fn list_authorizations(
        &self,
        subject: Uuid,
        client_id: &str,
    ) -> Result<Vec<Authorization>>;

    /// Create a permanent authorization unless a valid one already covers the
    /// given scope set. Runs find-then-create inside a single transaction so
    /// concurrent consent submissions converge on one grant. Returns the
    /// surviving authorization either way.
    async fn create_authorization_if_absent(
        &self,
        subject: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> Result<Authorization>;

    // ================================
    // Authorization Codes
    // ================================

    /// Store a freshly issued authorization code
    async fn store_auth_code(&self, code: &AuthCodeRecord) -> Result<()>;

    /// Atomically consume an authorization code. Validates client binding,
    /// redirect URI, expiry and the single-use flag in one operation;
    /// returns `None` when any check fails.
    async fn consume_auth_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthCodeRecord>>;

    // ================================
    // Refresh Tokens
    // ================================

    /// Store a freshly issued refresh token
    async fn store_refresh_token(&self, token: &RefreshTokenRecord) -> Result<()>;

    /// Atomically consume a refresh token for rotation. Validates client
    /// binding, revocation status and expiry in one operation; returns
    /// `None` when any check fails.
    async fn consume_refresh_token(
        &self,
        token: &str,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>>;
}
