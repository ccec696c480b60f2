// ABOUTME: Integration tests for consent submission and permanent grant creation
// ABOUTME: Covers the two-round-trip consent flow with full re-validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use chrono::Utc;
use ecommershop_identity::oidc::models::{AuthorizeRequest, ConsentForm, ConsentType};
use ecommershop_identity::oidc::AuthorizeOutcome;
use ecommershop_identity::seed;
use ecommershop_identity::storage::StorageProvider;
use ecommershop_identity::test_utils::{
    create_test_client, create_test_harness, create_test_user, store_client, store_user,
};

fn authorize_request(scope: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: "web-client".to_owned(),
        redirect_uri: "https://localhost:7001/signin-oidc".to_owned(),
        scope: Some(scope.to_owned()),
        state: Some("state-1".to_owned()),
        prompt: None,
        code_challenge: None,
        code_challenge_method: None,
    }
}

fn consent_form(action: &str, remember: bool, scope: &str) -> ConsentForm {
    ConsentForm {
        action: action.to_owned(),
        remember_consent: remember,
        client_id: "web-client".to_owned(),
        redirect_uri: "https://localhost:7001/signin-oidc".to_owned(),
        scope: Some(scope.to_owned()),
        state: Some("state-1".to_owned()),
        code_challenge: None,
        code_challenge_method: None,
    }
}

/// The full storefront journey: consent shown, granted with remember,
/// then skipped on the next visit
#[tokio::test]
async fn test_consent_journey_with_seeded_web_client() {
    let harness = create_test_harness().await;
    seed::seed_default_data(harness.storage.as_ref()).await.unwrap();

    // Seeded web-client requires PKCE; disable it here to focus on consent
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Explicit,
        &["profile", "email", "roles", "catalog"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;

    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    // First visit: consent UI with one description per requested scope
    let request = authorize_request("openid profile email");
    let outcome = harness.flow.authorize(&request, Some(user.id)).await.unwrap();
    let view = match outcome {
        AuthorizeOutcome::ShowConsent(view) => view,
        other => panic!("expected consent view, got {other:?}"),
    };
    assert_eq!(view.scope_descriptions.len(), 3);
    assert_eq!(view.scope_descriptions[1].name, "profile");
    assert_eq!(
        view.scope_descriptions[1].description,
        "Access to user profile information"
    );

    // Consent allowed with remember: a permanent grant for exactly the
    // requested scopes appears
    let outcome = harness
        .flow
        .consent(&consent_form("allow", true, "openid profile email"), user.id)
        .await
        .unwrap();
    let first_code = match outcome {
        AuthorizeOutcome::IssueCode { code, .. } => code,
        other => panic!("expected code issuance, got {other:?}"),
    };

    let grants = harness
        .storage
        .list_authorizations(user.id, "web-client")
        .await
        .unwrap();
    assert_eq!(grants.len(), 1);
    let mut granted_scopes = grants[0].scopes.clone();
    granted_scopes.sort();
    assert_eq!(granted_scopes, vec!["email", "openid", "profile"]);

    // Repeat authorization: auto-grant, new code referencing the same grant
    let outcome = harness.flow.authorize(&request, Some(user.id)).await.unwrap();
    let second_code = match outcome {
        AuthorizeOutcome::ShowConsent(_) => panic!("consent UI shown despite existing grant"),
        AuthorizeOutcome::IssueCode { code, .. } => code,
        other => panic!("expected code issuance, got {other:?}"),
    };
    assert_ne!(first_code, second_code);

    let record = harness
        .storage
        .consume_auth_code(
            &second_code,
            "web-client",
            "https://localhost:7001/signin-oidc",
            Utc::now(),
        )
        .await
        .unwrap()
        .expect("stored code record");
    assert_eq!(record.authorization_id, grants[0].id);

    // Still exactly one grant
    let grants_after = harness
        .storage
        .list_authorizations(user.id, "web-client")
        .await
        .unwrap();
    assert_eq!(grants_after.len(), 1);
}

#[tokio::test]
async fn test_consent_denied_yields_access_denied() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Explicit,
        &["profile", "email"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let error = harness
        .flow
        .consent(&consent_form("deny", false, "openid profile"), user.id)
        .await
        .unwrap_err();

    assert_eq!(error.error.error, "access_denied");
    // Denials travel back to the client
    assert!(error.redirect.is_some());

    // No grant was stored
    let grants = harness
        .storage
        .list_authorizations(user.id, "web-client")
        .await
        .unwrap();
    assert!(grants.is_empty());
}

#[tokio::test]
async fn test_consent_without_remember_still_issues_code() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Explicit,
        &["profile"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let outcome = harness
        .flow
        .consent(&consent_form("allow", false, "openid profile"), user.id)
        .await
        .unwrap();

    assert!(matches!(outcome, AuthorizeOutcome::IssueCode { .. }));
}

#[tokio::test]
async fn test_consent_revalidates_forwarded_scopes() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Explicit,
        &["profile"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    // A tampered consent form asking for scopes the client may not request
    let error = harness
        .flow
        .consent(
            &consent_form("allow", true, "openid profile email roles"),
            user.id,
        )
        .await
        .unwrap_err();

    assert_eq!(error.error.error, "invalid_scope");
    let grants = harness
        .storage
        .list_authorizations(user.id, "web-client")
        .await
        .unwrap();
    assert!(grants.is_empty());
}

#[tokio::test]
async fn test_consent_revalidates_forwarded_redirect_uri() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Explicit,
        &["profile"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let mut form = consent_form("allow", true, "openid profile");
    form.redirect_uri = "https://evil.example/steal".to_owned();

    let error = harness.flow.consent(&form, user.id).await.unwrap_err();
    assert_eq!(error.error.error, "invalid_request");
    assert!(error.redirect.is_none());
}

#[tokio::test]
async fn test_unknown_consent_action_rejected() {
    let harness = create_test_harness().await;
    let mut client = create_test_client(
        "web-client",
        "web-client-secret",
        ConsentType::Explicit,
        &["profile"],
    );
    client.requires_pkce = false;
    store_client(&harness.storage, &client).await;
    let user = create_test_user("shopper@example.com", &["user"]);
    store_user(&harness.storage, &user).await;

    let error = harness
        .flow
        .consent(&consent_form("maybe", false, "openid profile"), user.id)
        .await
        .unwrap_err();

    assert_eq!(error.error.error, "invalid_request");
}
