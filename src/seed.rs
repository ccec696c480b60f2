// ABOUTME: Seed provisioning for default scopes, clients, and the admin user
// ABOUTME: Idempotent setup run at startup or via the seed binary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use crate::models::User;
use crate::oidc::clients::ClientRegistry;
use crate::oidc::models::{Client, ClientType, ConsentType, Scope};
use crate::storage::StorageProvider;
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Provision default scopes, clients and the admin account.
///
/// Safe to run repeatedly: existing records are left untouched.
///
/// # Errors
/// Returns an error on storage or hashing failure
pub async fn seed_default_data(storage: &dyn StorageProvider) -> Result<()> {
    seed_scopes(storage).await?;
    seed_clients(storage).await?;
    seed_admin_user(storage).await?;
    info!("Seed data provisioning completed");
    Ok(())
}

async fn seed_scopes(storage: &dyn StorageProvider) -> Result<()> {
    let scopes = [
        Scope {
            name: "openid".to_owned(),
            display_name: "OpenID Connect".to_owned(),
            description: "OpenID Connect scope".to_owned(),
            resources: vec![],
        },
        Scope {
            name: "profile".to_owned(),
            display_name: "Profile".to_owned(),
            description: "Access to user profile information".to_owned(),
            resources: vec![],
        },
        Scope {
            name: "email".to_owned(),
            display_name: "Email".to_owned(),
            description: "Access to user email address".to_owned(),
            resources: vec![],
        },
        Scope {
            name: "roles".to_owned(),
            display_name: "Roles".to_owned(),
            description: "Access to user roles and permissions".to_owned(),
            resources: vec![],
        },
        Scope {
            name: "catalog".to_owned(),
            display_name: "Catalog API".to_owned(),
            description: "Access to catalog API".to_owned(),
            resources: vec!["catalog-api".to_owned()],
        },
    ];

    for scope in scopes {
        if storage.get_scope(&scope.name).await?.is_none() {
            storage.store_scope(&scope).await?;
        }
    }

    Ok(())
}

async fn seed_clients(storage: &dyn StorageProvider) -> Result<()> {
    let default_scopes = vec![
        "profile".to_owned(),
        "email".to_owned(),
        "roles".to_owned(),
        "catalog".to_owned(),
    ];

    if storage.get_client("web-client").await?.is_none() {
        let client = Client {
            id: Uuid::new_v4().to_string(),
            client_id: "web-client".to_owned(),
            client_secret_hash: Some(
                ClientRegistry::hash_client_secret("web-client-secret")
                    .context("Failed to hash web-client secret")?,
            ),
            client_type: ClientType::Confidential,
            display_name: "Web Application".to_owned(),
            redirect_uris: vec!["https://localhost:7001/signin-oidc".to_owned()],
            post_logout_redirect_uris: vec![
                "https://localhost:7001/signout-callback-oidc".to_owned()
            ],
            consent_type: ConsentType::Explicit,
            allowed_scopes: default_scopes.clone(),
            allowed_grant_types: vec![
                "authorization_code".to_owned(),
                "refresh_token".to_owned(),
            ],
            requires_pkce: true,
            created_at: Utc::now(),
        };
        storage.store_client(&client).await?;
        info!("Seeded client web-client");
    }

    if storage.get_client("mobile-client").await?.is_none() {
        let client = Client {
            id: Uuid::new_v4().to_string(),
            client_id: "mobile-client".to_owned(),
            client_secret_hash: None,
            client_type: ClientType::Public,
            display_name: "Mobile Application".to_owned(),
            redirect_uris: vec!["com.ecommershop.mobile://callback".to_owned()],
            post_logout_redirect_uris: vec![],
            consent_type: ConsentType::Explicit,
            allowed_scopes: default_scopes.clone(),
            allowed_grant_types: vec![
                "authorization_code".to_owned(),
                "refresh_token".to_owned(),
            ],
            requires_pkce: true,
            created_at: Utc::now(),
        };
        storage.store_client(&client).await?;
        info!("Seeded client mobile-client");
    }

    if storage.get_client("swagger-ui").await?.is_none() {
        let client = Client {
            id: Uuid::new_v4().to_string(),
            client_id: "swagger-ui".to_owned(),
            client_secret_hash: Some(
                ClientRegistry::hash_client_secret("swagger-ui-secret")
                    .context("Failed to hash swagger-ui secret")?,
            ),
            client_type: ClientType::Confidential,
            display_name: "Swagger UI".to_owned(),
            redirect_uris: vec!["https://localhost:7001/swagger/oauth2-redirect.html".to_owned()],
            post_logout_redirect_uris: vec![],
            consent_type: ConsentType::Implicit,
            allowed_scopes: default_scopes,
            allowed_grant_types: vec!["authorization_code".to_owned()],
            requires_pkce: true,
            created_at: Utc::now(),
        };
        storage.store_client(&client).await?;
        info!("Seeded client swagger-ui");
    }

    Ok(())
}

async fn seed_admin_user(storage: &dyn StorageProvider) -> Result<()> {
    let admin_email = "admin@example.com";

    if storage.get_user_by_email(admin_email).await?.is_none() {
        let user = User {
            id: Uuid::new_v4(),
            email: admin_email.to_owned(),
            email_verified: true,
            username: admin_email.to_owned(),
            first_name: Some("System".to_owned()),
            last_name: Some("Administrator".to_owned()),
            password_hash: bcrypt::hash("Admin123!", bcrypt::DEFAULT_COST)
                .context("Failed to hash admin password")?,
            security_stamp: Uuid::new_v4().to_string(),
            is_active: true,
            lockout_end: None,
            roles: vec!["admin".to_owned()],
            extra_claims: vec![],
            created_at: Utc::now(),
            last_login_at: None,
        };
        storage.create_user(&user).await?;
        info!("Seeded admin user {admin_email}");
    }

    Ok(())
}
