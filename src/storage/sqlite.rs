// ABOUTME: SQLite implementation of the StorageProvider trait
// ABOUTME: Runtime sqlx queries with manual row mapping and atomic credential consumption
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use crate::models::User;
use crate::oidc::models::{
    AuthCodeRecord, Authorization, AuthorizationStatus, AuthorizationType, Client, ClientType,
    ConsentType, RefreshTokenRecord, Scope,
};
use crate::storage::StorageProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

/// SQLite-backed storage provider
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open a connection pool for the given sqlx URL
    ///
    /// In-memory databases are pinned to a single connection: each SQLite
    /// `:memory:` connection is its own database.
    ///
    /// # Errors
    /// Returns an error if the URL is malformed or the database is unreachable
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);

        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Ok(Self { pool })
    }

    /// Access the underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let id: String = row.try_get("id")?;
        let roles_json: String = row.try_get("roles")?;
        let extra_claims_json: String = row.try_get("extra_claims")?;

        Ok(User {
            id: Uuid::parse_str(&id).context("Invalid user id in database")?,
            email: row.try_get("email")?,
            email_verified: row.try_get("email_verified")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            password_hash: row.try_get("password_hash")?,
            security_stamp: row.try_get("security_stamp")?,
            is_active: row.try_get("is_active")?,
            lockout_end: row.try_get("lockout_end")?,
            roles: serde_json::from_str(&roles_json).context("Invalid roles JSON")?,
            extra_claims: serde_json::from_str(&extra_claims_json)
                .context("Invalid extra_claims JSON")?,
            created_at: row.try_get("created_at")?,
            last_login_at: row.try_get("last_login_at")?,
        })
    }

    fn row_to_client(row: &SqliteRow) -> Result<Client> {
        let client_type: String = row.try_get("client_type")?;
        let consent_type: String = row.try_get("consent_type")?;
        let redirect_uris: String = row.try_get("redirect_uris")?;
        let post_logout: String = row.try_get("post_logout_redirect_uris")?;
        let allowed_scopes: String = row.try_get("allowed_scopes")?;
        let allowed_grant_types: String = row.try_get("allowed_grant_types")?;

        Ok(Client {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            client_secret_hash: row.try_get("client_secret_hash")?,
            client_type: ClientType::parse(&client_type),
            display_name: row.try_get("display_name")?,
            redirect_uris: serde_json::from_str(&redirect_uris)
                .context("Invalid redirect_uris JSON")?,
            post_logout_redirect_uris: serde_json::from_str(&post_logout)
                .context("Invalid post_logout_redirect_uris JSON")?,
            consent_type: ConsentType::parse(&consent_type),
            allowed_scopes: serde_json::from_str(&allowed_scopes)
                .context("Invalid allowed_scopes JSON")?,
            allowed_grant_types: serde_json::from_str(&allowed_grant_types)
                .context("Invalid allowed_grant_types JSON")?,
            requires_pkce: row.try_get("requires_pkce")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_scope(row: &SqliteRow) -> Result<Scope> {
        let resources: String = row.try_get("resources")?;
        Ok(Scope {
            name: row.try_get("name")?,
            display_name: row.try_get("display_name")?,
            description: row.try_get("description")?,
            resources: serde_json::from_str(&resources).context("Invalid resources JSON")?,
        })
    }

    fn row_to_authorization(row: &SqliteRow) -> Result<Authorization> {
        let subject: String = row.try_get("subject")?;
        let status: String = row.try_get("status")?;
        let auth_type: String = row.try_get("auth_type")?;
        let scopes: String = row.try_get("scopes")?;

        Ok(Authorization {
            id: row.try_get("id")?,
            subject: Uuid::parse_str(&subject).context("Invalid subject id in database")?,
            client_id: row.try_get("client_id")?,
            status: AuthorizationStatus::parse(&status),
            auth_type: AuthorizationType::parse(&auth_type),
            scopes: serde_json::from_str(&scopes).context("Invalid scopes JSON")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_auth_code(row: &SqliteRow) -> Result<AuthCodeRecord> {
        let subject: String = row.try_get("subject")?;
        let scopes: String = row.try_get("scopes")?;

        Ok(AuthCodeRecord {
            code: row.try_get("code")?,
            client_id: row.try_get("client_id")?,
            subject: Uuid::parse_str(&subject).context("Invalid subject id in database")?,
            authorization_id: row.try_get("authorization_id")?,
            redirect_uri: row.try_get("redirect_uri")?,
            scopes: serde_json::from_str(&scopes).context("Invalid scopes JSON")?,
            code_challenge: row.try_get("code_challenge")?,
            code_challenge_method: row.try_get("code_challenge_method")?,
            expires_at: row.try_get("expires_at")?,
            used: row.try_get("used")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_refresh_token(row: &SqliteRow) -> Result<RefreshTokenRecord> {
        let subject: String = row.try_get("subject")?;
        let scopes: String = row.try_get("scopes")?;

        Ok(RefreshTokenRecord {
            token: row.try_get("token")?,
            client_id: row.try_get("client_id")?,
            subject: Uuid::parse_str(&subject).context("Invalid subject id in database")?,
            authorization_id: row.try_get("authorization_id")?,
            scopes: serde_json::from_str(&scopes).context("Invalid scopes JSON")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
            revoked: row.try_get("revoked")?,
        })
    }
}

#[async_trait]
impl StorageProvider for SqliteStorage {
    async fn migrate(&self) -> Result<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                email_verified INTEGER NOT NULL DEFAULT 0,
                username TEXT NOT NULL,
                first_name TEXT,
                last_name TEXT,
                password_hash TEXT NOT NULL,
                security_stamp TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                lockout_end TEXT,
                roles TEXT NOT NULL DEFAULT '[]',
                extra_claims TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                last_login_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS oauth_clients (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL UNIQUE,
                client_secret_hash TEXT,
                client_type TEXT NOT NULL,
                display_name TEXT NOT NULL,
                redirect_uris TEXT NOT NULL DEFAULT '[]',
                post_logout_redirect_uris TEXT NOT NULL DEFAULT '[]',
                consent_type TEXT NOT NULL,
                allowed_scopes TEXT NOT NULL DEFAULT '[]',
                allowed_grant_types TEXT NOT NULL DEFAULT '[]',
                requires_pkce INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS oauth_scopes (
                name TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                description TEXT NOT NULL,
                resources TEXT NOT NULL DEFAULT '[]'
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS oauth_authorizations (
                id TEXT PRIMARY KEY,
                subject TEXT NOT NULL,
                client_id TEXT NOT NULL,
                status TEXT NOT NULL,
                auth_type TEXT NOT NULL,
                scopes TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_authorizations_subject_client
                ON oauth_authorizations (subject, client_id)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS oauth_auth_codes (
                code TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                authorization_id TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                scopes TEXT NOT NULL DEFAULT '[]',
                code_challenge TEXT,
                code_challenge_method TEXT,
                expires_at TEXT NOT NULL,
                used INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS oauth_refresh_tokens (
                token TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                authorization_id TEXT,
                scopes TEXT NOT NULL DEFAULT '[]',
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                revoked INTEGER NOT NULL DEFAULT 0
            )
            "#,
        ];

        for statement in ddl {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Schema migration failed")?;
        }

        tracing::debug!("SQLite schema migration completed");
        Ok(())
    }

    async fn create_user(&self, user: &User) -> Result<Uuid> {
        let query = r#"
            INSERT INTO users (
                id, email, email_verified, username, first_name, last_name,
                password_hash, security_stamp, is_active, lockout_end,
                roles, extra_claims, created_at, last_login_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(user.id.to_string())
            .bind(&user.email)
            .bind(user.email_verified)
            .bind(&user.username)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.password_hash)
            .bind(&user.security_stamp)
            .bind(user.is_active)
            .bind(user.lockout_end)
            .bind(serde_json::to_string(&user.roles)?)
            .bind(serde_json::to_string(&user.extra_claims)?)
            .bind(user.created_at)
            .bind(user.last_login_at)
            .execute(&self.pool)
            .await?;

        Ok(user.id)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn update_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(at)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_client(&self, client: &Client) -> Result<()> {
        let query = r#"
            INSERT OR REPLACE INTO oauth_clients (
                id, client_id, client_secret_hash, client_type, display_name,
                redirect_uris, post_logout_redirect_uris, consent_type,
                allowed_scopes, allowed_grant_types, requires_pkce, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(&client.id)
            .bind(&client.client_id)
            .bind(&client.client_secret_hash)
            .bind(client.client_type.as_str())
            .bind(&client.display_name)
            .bind(serde_json::to_string(&client.redirect_uris)?)
            .bind(serde_json::to_string(&client.post_logout_redirect_uris)?)
            .bind(client.consent_type.as_str())
            .bind(serde_json::to_string(&client.allowed_scopes)?)
            .bind(serde_json::to_string(&client.allowed_grant_types)?)
            .bind(client.requires_pkce)
            .bind(client.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT * FROM oauth_clients WHERE client_id = ?")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn store_scope(&self, scope: &Scope) -> Result<()> {
        let query = r#"
            INSERT OR REPLACE INTO oauth_scopes (name, display_name, description, resources)
            VALUES (?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(&scope.name)
            .bind(&scope.display_name)
            .bind(&scope.description)
            .bind(serde_json::to_string(&scope.resources)?)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_scope(&self, name: &str) -> Result<Option<Scope>> {
        let row = sqlx::query("SELECT * FROM oauth_scopes WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_scope).transpose()
    }

    async fn list_scopes(&self) -> Result<Vec<Scope>> {
        let rows = sqlx::query("SELECT * FROM oauth_scopes ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_scope).collect()
    }

    async fn list_authorizations(
        &self,
        subject: Uuid,
        client_id: &str,
    ) -> Result<Vec<Authorization>> {
        let query = r#"
            SELECT * FROM oauth_authorizations
            WHERE subject = ? AND client_id = ? AND status = 'valid' AND auth_type = 'permanent'
            ORDER BY created_at
        "#;

        let rows = sqlx::query(query)
            .bind(subject.to_string())
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_authorization).collect()
    }

    async fn create_authorization_if_absent(
        &self,
        subject: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> Result<Authorization> {
        let mut tx = self.pool.begin().await?;

        let query = r#"
            SELECT * FROM oauth_authorizations
            WHERE subject = ? AND client_id = ? AND status = 'valid' AND auth_type = 'permanent'
        "#;

        let rows = sqlx::query(query)
            .bind(subject.to_string())
            .bind(client_id)
            .fetch_all(&mut *tx)
            .await?;

        for row in &rows {
            let existing = Self::row_to_authorization(row)?;
            if existing.covers(scopes) {
                tx.commit().await?;
                return Ok(existing);
            }
        }

        let authorization = Authorization {
            id: Uuid::new_v4().to_string(),
            subject,
            client_id: client_id.to_owned(),
            status: AuthorizationStatus::Valid,
            auth_type: AuthorizationType::Permanent,
            scopes: scopes.to_vec(),
            created_at: Utc::now(),
        };

        let insert = r#"
            INSERT INTO oauth_authorizations (id, subject, client_id, status, auth_type, scopes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(insert)
            .bind(&authorization.id)
            .bind(authorization.subject.to_string())
            .bind(&authorization.client_id)
            .bind(authorization.status.as_str())
            .bind(authorization.auth_type.as_str())
            .bind(serde_json::to_string(&authorization.scopes)?)
            .bind(authorization.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            subject = %subject,
            client_id = %client_id,
            authorization_id = %authorization.id,
            "Created permanent authorization"
        );

        Ok(authorization)
    }

    async fn store_auth_code(&self, code: &AuthCodeRecord) -> Result<()> {
        let query = r#"
            INSERT INTO oauth_auth_codes (
                code, client_id, subject, authorization_id, redirect_uri, scopes,
                code_challenge, code_challenge_method, expires_at, used, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(&code.code)
            .bind(&code.client_id)
            .bind(code.subject.to_string())
            .bind(&code.authorization_id)
            .bind(&code.redirect_uri)
            .bind(serde_json::to_string(&code.scopes)?)
            .bind(&code.code_challenge)
            .bind(&code.code_challenge_method)
            .bind(code.expires_at)
            .bind(code.used)
            .bind(code.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn consume_auth_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthCodeRecord>> {
        // Single UPDATE guarded on every validity condition; a concurrent
        // exchange of the same code loses the race and sees zero rows.
        let update = r#"
            UPDATE oauth_auth_codes SET used = 1
            WHERE code = ? AND client_id = ? AND redirect_uri = ? AND used = 0 AND expires_at > ?
        "#;

        let result = sqlx::query(update)
            .bind(code)
            .bind(client_id)
            .bind(redirect_uri)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query("SELECT * FROM oauth_auth_codes WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_auth_code).transpose()
    }

    async fn store_refresh_token(&self, token: &RefreshTokenRecord) -> Result<()> {
        let query = r#"
            INSERT INTO oauth_refresh_tokens (
                token, client_id, subject, authorization_id, scopes,
                expires_at, created_at, revoked
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(&token.token)
            .bind(&token.client_id)
            .bind(token.subject.to_string())
            .bind(&token.authorization_id)
            .bind(serde_json::to_string(&token.scopes)?)
            .bind(token.expires_at)
            .bind(token.created_at)
            .bind(token.revoked)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn consume_refresh_token(
        &self,
        token: &str,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>> {
        let update = r#"
            UPDATE oauth_refresh_tokens SET revoked = 1
            WHERE token = ? AND client_id = ? AND revoked = 0 AND expires_at > ?
        "#;

        let result = sqlx::query(update)
            .bind(token)
            .bind(client_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query("SELECT * FROM oauth_refresh_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_refresh_token).transpose()
    }
}
