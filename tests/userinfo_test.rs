// ABOUTME: Integration tests for the userinfo endpoint claim projection
// ABOUTME: Verifies scope gating derived from the access token itself
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use ecommershop_identity::models::User;
use ecommershop_identity::test_utils::{create_test_harness, create_test_user, store_user, TestHarness};

async fn issue_token_for(harness: &TestHarness, user: &User, scopes: &[&str]) -> String {
    let scope_list: Vec<String> = scopes.iter().map(|s| (*s).to_owned()).collect();
    let claims = harness.projector.project(user, &scope_list);
    harness
        .issuer
        .issue_access_token(&user.id.to_string(), "web-client", &claims, &[])
        .unwrap()
}

#[tokio::test]
async fn test_openid_only_token_yields_sub_only() {
    let harness = create_test_harness().await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let token = issue_token_for(&harness, &user, &["openid"]).await;
    let claims = harness.userinfo.userinfo(&token).await.unwrap();

    let map = claims.as_object().unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map["sub"], user.id.to_string());
}

#[tokio::test]
async fn test_email_scope_gates_email_claims() {
    let harness = create_test_harness().await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let token = issue_token_for(&harness, &user, &["openid", "email"]).await;
    let claims = harness.userinfo.userinfo(&token).await.unwrap();
    let map = claims.as_object().unwrap();

    assert_eq!(map["email"], "shopper@example.com");
    assert_eq!(map["email_verified"], true);
    assert!(!map.contains_key("name"));
    assert!(!map.contains_key("role"));
}

#[tokio::test]
async fn test_profile_scope_gates_profile_claims() {
    let harness = create_test_harness().await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let token = issue_token_for(&harness, &user, &["openid", "profile"]).await;
    let claims = harness.userinfo.userinfo(&token).await.unwrap();
    let map = claims.as_object().unwrap();

    assert_eq!(map["name"], "Test User");
    assert_eq!(map["given_name"], "Test");
    assert_eq!(map["family_name"], "User");
    assert_eq!(map["preferred_username"], "shopper@example.com");
    assert!(map.contains_key("created_at"));
    assert!(!map.contains_key("email"));
}

#[tokio::test]
async fn test_roles_scope_yields_roles_and_permissions() {
    let harness = create_test_harness().await;
    let user = create_test_user("admin@example.com", &["admin"]);
    store_user(&harness.storage, &user).await;

    let token = issue_token_for(&harness, &user, &["openid", "roles"]).await;
    let claims = harness.userinfo.userinfo(&token).await.unwrap();
    let map = claims.as_object().unwrap();

    let roles = map["role"].as_array().unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0], "admin");

    let permissions = map["permissions"].as_array().unwrap();
    assert!(permissions.iter().any(|p| p == "system.admin"));
}

#[tokio::test]
async fn test_security_stamp_never_appears() {
    let harness = create_test_harness().await;
    let user = create_test_user("shopper@example.com", &["admin", "user"]);
    store_user(&harness.storage, &user).await;

    let token = issue_token_for(
        &harness,
        &user,
        &["openid", "profile", "email", "roles", "catalog"],
    )
    .await;
    let claims = harness.userinfo.userinfo(&token).await.unwrap();

    assert!(!claims.as_object().unwrap().contains_key("security_stamp"));
    assert!(!claims.to_string().contains(&user.security_stamp));
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let harness = create_test_harness().await;
    let error = harness.userinfo.userinfo("garbage").await.unwrap_err();
    assert_eq!(error.error, "invalid_token");
}

#[tokio::test]
async fn test_client_credentials_token_has_no_user() {
    let harness = create_test_harness().await;

    // A machine token's subject is a client id, not a user id
    let claims = ecommershop_identity::oidc::claims::ClaimsSet {
        claims: vec![],
        scopes: vec!["catalog".to_owned()],
    };
    let token = harness
        .issuer
        .issue_access_token("web-client", "web-client", &claims, &[])
        .unwrap();

    let error = harness.userinfo.userinfo(&token).await.unwrap_err();
    assert_eq!(error.error, "invalid_token");
}

#[tokio::test]
async fn test_deleted_user_token_rejected() {
    let harness = create_test_harness().await;
    // Token for a user that never reached the store
    let user = create_test_user("ghost@example.com", &["user"]);

    let token = issue_token_for(&harness, &user, &["openid"]).await;
    let error = harness.userinfo.userinfo(&token).await.unwrap_err();
    assert_eq!(error.error, "invalid_token");
}
