// ABOUTME: Integration tests for the SQLite storage layer
// ABOUTME: Record round-trips, atomic consumption, and file-backed databases
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use chrono::{Duration, Utc};
use ecommershop_identity::oidc::models::{AuthCodeRecord, ConsentType, RefreshTokenRecord};
use ecommershop_identity::storage::{SqliteStorage, StorageProvider};
use ecommershop_identity::test_utils::{create_test_client, create_test_storage, create_test_user};
use uuid::Uuid;

#[tokio::test]
async fn test_user_round_trip_and_last_login() {
    let storage = create_test_storage().await;
    let mut user = create_test_user("jane@example.com", &["admin", "user"]);
    user.extra_claims
        .push(("loyalty_tier".to_owned(), "gold".to_owned()));

    storage.create_user(&user).await.unwrap();

    let by_id = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "jane@example.com");
    assert_eq!(by_id.roles, vec!["admin", "user"]);
    assert_eq!(by_id.extra_claims.len(), 1);
    assert!(by_id.last_login_at.is_none());

    let by_email = storage
        .get_user_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, user.id);

    let login_time = Utc::now();
    storage.update_last_login(user.id, login_time).await.unwrap();
    let after_login = storage.get_user(user.id).await.unwrap().unwrap();
    assert!(after_login.last_login_at.is_some());

    assert!(storage
        .get_user(Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_client_round_trip() {
    let storage = create_test_storage().await;
    let client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Explicit,
        &["profile", "email"],
    );
    storage.store_client(&client).await.unwrap();

    let loaded = storage.get_client("web-client").await.unwrap().unwrap();
    assert_eq!(loaded.client_id, "web-client");
    assert_eq!(loaded.consent_type, ConsentType::Explicit);
    assert_eq!(loaded.allowed_scopes, vec!["profile", "email"]);
    assert!(loaded.client_secret_hash.is_some());

    assert!(storage.get_client("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_auth_code_not_consumable() {
    let storage = create_test_storage().await;
    let now = Utc::now();

    let record = AuthCodeRecord {
        code: "expired-code".to_owned(),
        client_id: "web-client".to_owned(),
        subject: Uuid::new_v4(),
        authorization_id: "auth-1".to_owned(),
        redirect_uri: "https://localhost:7001/signin-oidc".to_owned(),
        scopes: vec!["openid".to_owned()],
        code_challenge: None,
        code_challenge_method: None,
        expires_at: now - Duration::minutes(1),
        used: false,
        created_at: now - Duration::minutes(11),
    };
    storage.store_auth_code(&record).await.unwrap();

    let consumed = storage
        .consume_auth_code(
            "expired-code",
            "web-client",
            "https://localhost:7001/signin-oidc",
            now,
        )
        .await
        .unwrap();
    assert!(consumed.is_none());
}

#[tokio::test]
async fn test_auth_code_client_binding_enforced() {
    let storage = create_test_storage().await;
    let now = Utc::now();

    let record = AuthCodeRecord {
        code: "bound-code".to_owned(),
        client_id: "web-client".to_owned(),
        subject: Uuid::new_v4(),
        authorization_id: "auth-1".to_owned(),
        redirect_uri: "https://localhost:7001/signin-oidc".to_owned(),
        scopes: vec!["openid".to_owned()],
        code_challenge: None,
        code_challenge_method: None,
        expires_at: now + Duration::minutes(10),
        used: false,
        created_at: now,
    };
    storage.store_auth_code(&record).await.unwrap();

    // Wrong client cannot consume, and the code survives for its owner
    assert!(storage
        .consume_auth_code(
            "bound-code",
            "mobile-client",
            "https://localhost:7001/signin-oidc",
            now,
        )
        .await
        .unwrap()
        .is_none());

    let consumed = storage
        .consume_auth_code(
            "bound-code",
            "web-client",
            "https://localhost:7001/signin-oidc",
            now,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(consumed.authorization_id, "auth-1");
}

#[tokio::test]
async fn test_refresh_token_single_consumption() {
    let storage = create_test_storage().await;
    let now = Utc::now();

    let record = RefreshTokenRecord {
        token: "refresh-1".to_owned(),
        client_id: "web-client".to_owned(),
        subject: Uuid::new_v4(),
        authorization_id: None,
        scopes: vec!["openid".to_owned(), "profile".to_owned()],
        expires_at: now + Duration::days(14),
        created_at: now,
        revoked: false,
    };
    storage.store_refresh_token(&record).await.unwrap();

    let first = storage
        .consume_refresh_token("refresh-1", "web-client", now)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = storage
        .consume_refresh_token("refresh-1", "web-client", now)
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn test_file_backed_database_created_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.db");
    let url = format!("sqlite:{}", path.display());

    let storage = SqliteStorage::new(&url).await.unwrap();
    storage.migrate().await.unwrap();

    let user = create_test_user("disk@example.com", &["user"]);
    storage.create_user(&user).await.unwrap();

    // A second pool over the same file sees the data
    let reopened = SqliteStorage::new(&url).await.unwrap();
    let loaded = reopened
        .get_user_by_email("disk@example.com")
        .await
        .unwrap();
    assert!(loaded.is_some());
}
