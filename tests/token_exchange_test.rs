// ABOUTME: Integration tests for the token endpoint grant dispatch
// ABOUTME: Covers code exchange, reuse rejection, PKCE, client credentials, refresh rotation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use base64::{engine::general_purpose, Engine as _};
use ecommershop_identity::oidc::models::{AuthorizeRequest, ConsentType, TokenRequest};
use ecommershop_identity::oidc::AuthorizeOutcome;
use ecommershop_identity::test_utils::{
    create_test_client, create_test_harness, create_test_public_client, create_test_user,
    store_client, store_user, TestHarness,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const REDIRECT_URI: &str = "https://localhost:7001/signin-oidc";
const MOBILE_REDIRECT_URI: &str = "com.ecommershop.mobile://callback";

fn token_request(grant_type: &str, client_id: &str, secret: Option<&str>) -> TokenRequest {
    TokenRequest {
        grant_type: grant_type.to_owned(),
        code: None,
        redirect_uri: None,
        client_id: client_id.to_owned(),
        client_secret: secret.map(str::to_owned),
        scope: None,
        refresh_token: None,
        code_verifier: None,
    }
}

/// Issue a code for an implicit-consent confidential client
async fn issue_code(harness: &TestHarness, client_id: &str, user_id: Uuid, scope: &str) -> String {
    let request = AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: client_id.to_owned(),
        redirect_uri: REDIRECT_URI.to_owned(),
        scope: Some(scope.to_owned()),
        state: None,
        prompt: None,
        code_challenge: None,
        code_challenge_method: None,
    };

    match harness.flow.authorize(&request, Some(user_id)).await.unwrap() {
        AuthorizeOutcome::IssueCode { code, .. } => code,
        other => panic!("expected code issuance, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authorization_code_exchange_happy_path() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["profile", "email", "roles"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let code = issue_code(&harness, "web-client", user.id, "openid profile email").await;

    let mut request = token_request("authorization_code", "web-client", Some("web-client-secret"));
    request.code = Some(code);
    request.redirect_uri = Some(REDIRECT_URI.to_owned());

    let response = harness.exchange.exchange(request).await.unwrap();

    assert_eq!(response.token_type, "Bearer");
    assert_eq!(response.expires_in, 3600);
    assert_eq!(response.scope.as_deref(), Some("openid profile email"));
    // openid was granted, so an identity token rides along
    assert!(response.id_token.is_some());
    // The client may use refresh_token, so one is issued
    assert!(response.refresh_token.is_some());

    let claims = harness
        .issuer
        .validate_access_token(&response.access_token)
        .unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.client_id, "web-client");
}

#[tokio::test]
async fn test_authorization_code_reuse_rejected() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["profile"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let code = issue_code(&harness, "web-client", user.id, "openid profile").await;

    let make_request = || {
        let mut request =
            token_request("authorization_code", "web-client", Some("web-client-secret"));
        request.code = Some(code.clone());
        request.redirect_uri = Some(REDIRECT_URI.to_owned());
        request
    };

    harness.exchange.exchange(make_request()).await.unwrap();

    let error = harness.exchange.exchange(make_request()).await.unwrap_err();
    assert_eq!(error.error, "invalid_grant");
}

#[tokio::test]
async fn test_redirect_uri_mismatch_rejected() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["profile"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let code = issue_code(&harness, "web-client", user.id, "openid profile").await;

    let mut request = token_request("authorization_code", "web-client", Some("web-client-secret"));
    request.code = Some(code);
    request.redirect_uri = Some("https://other.example/callback".to_owned());

    let error = harness.exchange.exchange(request).await.unwrap_err();
    assert_eq!(error.error, "invalid_grant");
}

#[tokio::test]
async fn test_wrong_client_secret_rejected() {
    let harness = create_test_harness().await;
    let client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["profile"],
    );
    store_client(&harness.storage, &client).await;

    let error = harness
        .exchange
        .exchange(token_request(
            "client_credentials",
            "web-client",
            Some("not-the-secret"),
        ))
        .await
        .unwrap_err();

    assert_eq!(error.error, "invalid_client");
}

#[tokio::test]
async fn test_unknown_client_and_wrong_secret_are_indistinguishable() {
    let harness = create_test_harness().await;
    let client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["profile"],
    );
    store_client(&harness.storage, &client).await;

    let unknown = harness
        .exchange
        .exchange(token_request("client_credentials", "ghost", Some("x")))
        .await
        .unwrap_err();
    let wrong_secret = harness
        .exchange
        .exchange(token_request("client_credentials", "web-client", Some("x")))
        .await
        .unwrap_err();

    assert_eq!(unknown.error, "invalid_client");
    assert_eq!(unknown.error_description, wrong_secret.error_description);
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let harness = create_test_harness().await;
    let client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["profile"],
    );
    store_client(&harness.storage, &client).await;

    let error = harness
        .exchange
        .exchange(token_request("password", "web-client", Some("web-client-secret")))
        .await
        .unwrap_err();

    assert_eq!(error.error, "unsupported_grant_type");
}

#[tokio::test]
async fn test_grant_type_outside_client_allowance() {
    let harness = create_test_harness().await;
    // Public mobile client: authorization_code + refresh_token only
    let client = create_test_public_client("mobile-client", &["profile"]);
    store_client(&harness.storage, &client).await;

    let error = harness
        .exchange
        .exchange(token_request("client_credentials", "mobile-client", None))
        .await
        .unwrap_err();

    assert_eq!(error.error, "unauthorized_client");
}

#[tokio::test]
async fn test_client_credentials_subject_is_client_and_no_refresh_token() {
    let harness = create_test_harness().await;
    let client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["catalog"],
    );
    store_client(&harness.storage, &client).await;

    let mut request = token_request("client_credentials", "web-client", Some("web-client-secret"));
    request.scope = Some("catalog".to_owned());

    let response = harness.exchange.exchange(request).await.unwrap();

    assert!(response.refresh_token.is_none());
    assert!(response.id_token.is_none());

    let claims = harness
        .issuer
        .validate_access_token(&response.access_token)
        .unwrap();
    assert_eq!(claims.sub, "web-client");
    assert_eq!(claims.scopes(), vec!["catalog"]);
}

#[tokio::test]
async fn test_client_credentials_scope_outside_allowance() {
    let harness = create_test_harness().await;
    let client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["catalog"],
    );
    store_client(&harness.storage, &client).await;

    let mut request = token_request("client_credentials", "web-client", Some("web-client-secret"));
    request.scope = Some("catalog orders".to_owned());

    let error = harness.exchange.exchange(request).await.unwrap_err();
    assert_eq!(error.error, "invalid_scope");
}

#[tokio::test]
async fn test_refresh_token_rotation() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["profile"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let code = issue_code(&harness, "web-client", user.id, "openid profile").await;
    let mut request = token_request("authorization_code", "web-client", Some("web-client-secret"));
    request.code = Some(code);
    request.redirect_uri = Some(REDIRECT_URI.to_owned());
    let first = harness.exchange.exchange(request).await.unwrap();
    let first_refresh = first.refresh_token.unwrap();

    let mut refresh_request =
        token_request("refresh_token", "web-client", Some("web-client-secret"));
    refresh_request.refresh_token = Some(first_refresh.clone());
    let second = harness.exchange.exchange(refresh_request).await.unwrap();

    let second_refresh = second.refresh_token.unwrap();
    assert_ne!(first_refresh, second_refresh);
    assert_eq!(second.scope.as_deref(), Some("openid profile"));

    // The consumed refresh token is gone for good
    let mut replay = token_request("refresh_token", "web-client", Some("web-client-secret"));
    replay.refresh_token = Some(first_refresh);
    let error = harness.exchange.exchange(replay).await.unwrap_err();
    assert_eq!(error.error, "invalid_grant");
}

#[tokio::test]
async fn test_disabled_user_cannot_exchange_code() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Implicit,
        &["profile"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;

    let mut user = create_test_user("locked@example.com", &["user"]);
    user.is_active = false;
    store_user(&harness.storage, &user).await;

    let code = issue_code(&harness, "web-client", user.id, "openid profile").await;

    let mut request = token_request("authorization_code", "web-client", Some("web-client-secret"));
    request.code = Some(code);
    request.redirect_uri = Some(REDIRECT_URI.to_owned());

    let error = harness.exchange.exchange(request).await.unwrap_err();
    assert_eq!(error.error, "invalid_grant");
    assert!(error
        .error_description
        .unwrap()
        .contains("no longer allowed to sign in"));
}

#[tokio::test]
async fn test_pkce_flow_for_public_client() {
    let harness = create_test_harness().await;
    let client = create_test_public_client("mobile-client", &["profile"]);
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXkabcdef";
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());

    let request = AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: "mobile-client".to_owned(),
        redirect_uri: MOBILE_REDIRECT_URI.to_owned(),
        scope: Some("openid profile".to_owned()),
        state: None,
        prompt: None,
        code_challenge: Some(challenge.clone()),
        code_challenge_method: Some("S256".to_owned()),
    };
    let outcome = harness.flow.authorize(&request, Some(user.id)).await.unwrap();
    assert!(matches!(outcome, AuthorizeOutcome::ShowConsent(_)));

    let form = ecommershop_identity::oidc::models::ConsentForm {
        action: "allow".to_owned(),
        remember_consent: true,
        client_id: "mobile-client".to_owned(),
        redirect_uri: MOBILE_REDIRECT_URI.to_owned(),
        scope: Some("openid profile".to_owned()),
        state: None,
        code_challenge: Some(challenge),
        code_challenge_method: Some("S256".to_owned()),
    };
    let code = match harness.flow.consent(&form, user.id).await.unwrap() {
        AuthorizeOutcome::IssueCode { code, .. } => code,
        other => panic!("expected code issuance, got {other:?}"),
    };

    // Wrong verifier burns the code
    let mut bad = token_request("authorization_code", "mobile-client", None);
    bad.code = Some(code.clone());
    bad.redirect_uri = Some(MOBILE_REDIRECT_URI.to_owned());
    bad.code_verifier = Some("wrong-verifier-wrong-verifier-wrong-verifier-xx".to_owned());
    let error = harness.exchange.exchange(bad).await.unwrap_err();
    assert_eq!(error.error, "invalid_grant");

    // A second attempt with the right verifier still fails: single use
    let mut good = token_request("authorization_code", "mobile-client", None);
    good.code = Some(code);
    good.redirect_uri = Some(MOBILE_REDIRECT_URI.to_owned());
    good.code_verifier = Some(verifier.to_owned());
    let error = harness.exchange.exchange(good).await.unwrap_err();
    assert_eq!(error.error, "invalid_grant");
}

#[tokio::test]
async fn test_pkce_success_for_public_client() {
    let harness = create_test_harness().await;
    let client = create_test_public_client("mobile-client", &["profile"]);
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXkabcdef";
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());

    let form = ecommershop_identity::oidc::models::ConsentForm {
        action: "allow".to_owned(),
        remember_consent: true,
        client_id: "mobile-client".to_owned(),
        redirect_uri: MOBILE_REDIRECT_URI.to_owned(),
        scope: Some("openid profile".to_owned()),
        state: None,
        code_challenge: Some(challenge),
        code_challenge_method: Some("S256".to_owned()),
    };
    let code = match harness.flow.consent(&form, user.id).await.unwrap() {
        AuthorizeOutcome::IssueCode { code, .. } => code,
        other => panic!("expected code issuance, got {other:?}"),
    };

    let mut request = token_request("authorization_code", "mobile-client", None);
    request.code = Some(code);
    request.redirect_uri = Some(MOBILE_REDIRECT_URI.to_owned());
    request.code_verifier = Some(verifier.to_owned());

    let response = harness.exchange.exchange(request).await.unwrap();
    assert!(response.id_token.is_some());
    assert!(response.refresh_token.is_some());
}
