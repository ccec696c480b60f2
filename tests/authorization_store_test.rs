// ABOUTME: Integration tests for the permanent authorization store
// ABOUTME: Superset scope matching, create-if-absent uniqueness, revocation filtering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use ecommershop_identity::oidc::AuthorizationStore;
use ecommershop_identity::storage::StorageProvider;
use ecommershop_identity::test_utils::create_test_storage;
use std::sync::Arc;
use uuid::Uuid;

fn scopes(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
}

#[tokio::test]
async fn test_superset_grant_covers_subset_request() {
    let storage = Arc::new(create_test_storage().await);
    let store = AuthorizationStore::new(storage.clone());
    let subject = Uuid::new_v4();

    store
        .ensure_permanent(subject, "web-client", &scopes(&["openid", "profile", "email"]))
        .await
        .unwrap();

    let covering = store
        .find_covering(subject, "web-client", &scopes(&["openid", "profile"]))
        .await
        .unwrap();
    assert_eq!(covering.len(), 1);

    let not_covering = store
        .find_covering(subject, "web-client", &scopes(&["openid", "roles"]))
        .await
        .unwrap();
    assert!(not_covering.is_empty());
}

#[tokio::test]
async fn test_exact_match_counts_as_covering() {
    let storage = Arc::new(create_test_storage().await);
    let store = AuthorizationStore::new(storage.clone());
    let subject = Uuid::new_v4();

    store
        .ensure_permanent(subject, "web-client", &scopes(&["openid"]))
        .await
        .unwrap();

    let covering = store
        .find_covering(subject, "web-client", &scopes(&["openid"]))
        .await
        .unwrap();
    assert_eq!(covering.len(), 1);
}

#[tokio::test]
async fn test_ensure_permanent_is_idempotent() {
    let storage = Arc::new(create_test_storage().await);
    let store = AuthorizationStore::new(storage.clone());
    let subject = Uuid::new_v4();

    let first = store
        .ensure_permanent(subject, "web-client", &scopes(&["openid", "profile"]))
        .await
        .unwrap();
    let second = store
        .ensure_permanent(subject, "web-client", &scopes(&["openid", "profile"]))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);

    let all = storage
        .list_authorizations(subject, "web-client")
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_ensure_permanent_reuses_covering_grant() {
    let storage = Arc::new(create_test_storage().await);
    let store = AuthorizationStore::new(storage.clone());
    let subject = Uuid::new_v4();

    let broad = store
        .ensure_permanent(
            subject,
            "web-client",
            &scopes(&["openid", "profile", "email"]),
        )
        .await
        .unwrap();

    // A narrower request rides the existing broader grant
    let narrow = store
        .ensure_permanent(subject, "web-client", &scopes(&["openid", "profile"]))
        .await
        .unwrap();
    assert_eq!(broad.id, narrow.id);
}

#[tokio::test]
async fn test_wider_request_creates_new_grant() {
    let storage = Arc::new(create_test_storage().await);
    let store = AuthorizationStore::new(storage.clone());
    let subject = Uuid::new_v4();

    store
        .ensure_permanent(subject, "web-client", &scopes(&["openid"]))
        .await
        .unwrap();
    store
        .ensure_permanent(subject, "web-client", &scopes(&["openid", "email"]))
        .await
        .unwrap();

    let all = storage
        .list_authorizations(subject, "web-client")
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_grants_are_per_subject_and_client() {
    let storage = Arc::new(create_test_storage().await);
    let store = AuthorizationStore::new(storage.clone());
    let subject = Uuid::new_v4();
    let other_subject = Uuid::new_v4();

    store
        .ensure_permanent(subject, "web-client", &scopes(&["openid"]))
        .await
        .unwrap();

    assert!(store
        .find_covering(other_subject, "web-client", &scopes(&["openid"]))
        .await
        .unwrap()
        .is_empty());
    assert!(store
        .find_covering(subject, "mobile-client", &scopes(&["openid"]))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_revoked_grants_are_ignored() {
    let storage = Arc::new(create_test_storage().await);
    let store = AuthorizationStore::new(storage.clone());
    let subject = Uuid::new_v4();

    let grant = store
        .ensure_permanent(subject, "web-client", &scopes(&["openid"]))
        .await
        .unwrap();

    sqlx::query("UPDATE oauth_authorizations SET status = 'revoked' WHERE id = ?")
        .bind(&grant.id)
        .execute(storage.pool())
        .await
        .unwrap();

    assert!(store
        .find_covering(subject, "web-client", &scopes(&["openid"]))
        .await
        .unwrap()
        .is_empty());

    // A fresh consent after revocation creates a new grant
    let fresh = store
        .ensure_permanent(subject, "web-client", &scopes(&["openid"]))
        .await
        .unwrap();
    assert_ne!(fresh.id, grant.id);
}
