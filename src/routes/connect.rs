// ABOUTME: HTTP handlers for the /connect protocol endpoints
// ABOUTME: Authorization, consent submission, token exchange, and userinfo over axum
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use crate::errors::AppError;
use crate::oidc::authorize::{AuthorizeError, AuthorizeOutcome};
use crate::oidc::models::{AuthorizeRequest, ConsentForm, OAuth2Error, TokenRequest};
use crate::resources::ServerResources;
use axum::{
    extract::{Form, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use http::{header, StatusCode};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

/// `/connect/*` protocol routes
pub struct ConnectRoutes;

impl ConnectRoutes {
    /// Create all protocol endpoint routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/connect/authorize",
                get(Self::handle_authorize_get).post(Self::handle_authorize_post),
            )
            .route("/connect/consent", post(Self::handle_consent))
            .route("/connect/token", post(Self::handle_token))
            .route(
                "/connect/userinfo",
                get(Self::handle_userinfo).post(Self::handle_userinfo),
            )
            .with_state(resources)
    }

    /// Handle GET /connect/authorize
    async fn handle_authorize_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        Self::authorize(&resources, &headers, &params).await
    }

    /// Handle POST /connect/authorize (form encoded)
    async fn handle_authorize_post(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Form(params): Form<HashMap<String, String>>,
    ) -> Response {
        Self::authorize(&resources, &headers, &params).await
    }

    async fn authorize(
        resources: &ServerResources,
        headers: &HeaderMap,
        params: &HashMap<String, String>,
    ) -> Response {
        let request = match parse_authorize_request(params) {
            Ok(request) => request,
            Err(error) => return (StatusCode::BAD_REQUEST, Json(error)).into_response(),
        };

        let principal = resources
            .session_manager
            .authenticate(headers)
            .map(|p| p.user_id);

        match resources
            .authorization_flow
            .authorize(&request, principal)
            .await
        {
            Ok(AuthorizeOutcome::ChallengeLogin) => {
                let return_url = build_return_url(&request);
                let login_url = resources.session_manager.login_redirect_url(&return_url);
                redirect(&login_url)
            }
            Ok(AuthorizeOutcome::ShowConsent(view)) => {
                (StatusCode::OK, Json(view)).into_response()
            }
            Ok(AuthorizeOutcome::IssueCode {
                redirect_uri,
                code,
                state,
            }) => {
                info!(client_id = %request.client_id, "Redirecting with authorization code");
                redirect(&code_redirect_url(&redirect_uri, &code, state.as_deref()))
            }
            Err(error) => authorize_error_response(&error),
        }
    }

    /// Handle POST /connect/consent (form encoded, authenticated)
    async fn handle_consent(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Form(params): Form<HashMap<String, String>>,
    ) -> Response {
        let Some(principal) = resources.session_manager.authenticate(&headers) else {
            return AppError::auth_required().into_response();
        };

        let form = match parse_consent_form(&params) {
            Ok(form) => form,
            Err(error) => return (StatusCode::BAD_REQUEST, Json(error)).into_response(),
        };

        match resources
            .authorization_flow
            .consent(&form, principal.user_id)
            .await
        {
            Ok(AuthorizeOutcome::IssueCode {
                redirect_uri,
                code,
                state,
            }) => redirect(&code_redirect_url(&redirect_uri, &code, state.as_deref())),
            // Consent submissions never challenge or re-show consent
            Ok(AuthorizeOutcome::ChallengeLogin | AuthorizeOutcome::ShowConsent(_)) => {
                AppError::internal("Unexpected consent outcome").into_response()
            }
            Err(error) => authorize_error_response(&error),
        }
    }

    /// Handle POST /connect/token (form encoded)
    async fn handle_token(
        State(resources): State<Arc<ServerResources>>,
        Form(params): Form<HashMap<String, String>>,
    ) -> Response {
        let request = match parse_token_request(&params) {
            Ok(request) => request,
            Err(error) => {
                warn!("Token request parsing failed: {:?}", error.error);
                return (StatusCode::BAD_REQUEST, Json(error)).into_response();
            }
        };

        let client_id = request.client_id.clone();

        match resources.token_exchange.exchange(request).await {
            Ok(response) => {
                info!(client_id = %client_id, "Token exchange successful");
                (StatusCode::OK, Json(response)).into_response()
            }
            Err(error) => {
                warn!(
                    client_id = %client_id,
                    error = %error.error,
                    "Token exchange failed"
                );
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            }
        }
    }

    /// Handle GET|POST /connect/userinfo (bearer authenticated)
    async fn handle_userinfo(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Response {
        let Some(token) = bearer_token(&headers) else {
            return bearer_challenge(&OAuth2Error::invalid_token(
                "Missing bearer access token",
            ));
        };

        match resources.userinfo.userinfo(&token).await {
            Ok(claims) => (StatusCode::OK, Json(claims)).into_response(),
            Err(error) if error.error == "invalid_token" => bearer_challenge(&error),
            Err(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            }
        }
    }
}

/// Parse query/form parameters into an `AuthorizeRequest`
fn parse_authorize_request(
    params: &HashMap<String, String>,
) -> Result<AuthorizeRequest, OAuth2Error> {
    let response_type = params
        .get("response_type")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing response_type parameter"))?
        .clone();

    let client_id = params
        .get("client_id")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing client_id parameter"))?
        .clone();

    let redirect_uri = params
        .get("redirect_uri")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing redirect_uri parameter"))?
        .clone();

    Ok(AuthorizeRequest {
        response_type,
        client_id,
        redirect_uri,
        scope: params.get("scope").cloned(),
        state: params.get("state").cloned(),
        prompt: params.get("prompt").cloned(),
        code_challenge: params.get("code_challenge").cloned(),
        code_challenge_method: params.get("code_challenge_method").cloned(),
    })
}

/// Parse form parameters into a `ConsentForm`
fn parse_consent_form(params: &HashMap<String, String>) -> Result<ConsentForm, OAuth2Error> {
    let action = params
        .get("action")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing action parameter"))?
        .clone();

    let client_id = params
        .get("client_id")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing client_id parameter"))?
        .clone();

    let redirect_uri = params
        .get("redirect_uri")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing redirect_uri parameter"))?
        .clone();

    let remember_consent = params
        .get("remember_consent")
        .is_some_and(|v| matches!(v.as_str(), "true" | "on" | "1"));

    Ok(ConsentForm {
        action,
        remember_consent,
        client_id,
        redirect_uri,
        scope: params.get("scope").cloned(),
        state: params.get("state").cloned(),
        code_challenge: params.get("code_challenge").cloned(),
        code_challenge_method: params.get("code_challenge_method").cloned(),
    })
}

/// Parse form parameters into a `TokenRequest`
fn parse_token_request(params: &HashMap<String, String>) -> Result<TokenRequest, OAuth2Error> {
    let grant_type = params
        .get("grant_type")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing grant_type parameter"))?
        .clone();

    let client_id = params
        .get("client_id")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing client_id parameter"))?
        .clone();

    Ok(TokenRequest {
        grant_type,
        code: params.get("code").cloned(),
        redirect_uri: params.get("redirect_uri").cloned(),
        client_id,
        client_secret: params.get("client_secret").cloned(),
        scope: params.get("scope").cloned(),
        refresh_token: params.get("refresh_token").cloned(),
        code_verifier: params.get("code_verifier").cloned(),
    })
}

/// Rebuild the authorization request as a return URL for the login redirect
fn build_return_url(request: &AuthorizeRequest) -> String {
    let mut url = format!(
        "/connect/authorize?response_type={}&client_id={}&redirect_uri={}",
        urlencoding::encode(&request.response_type),
        urlencoding::encode(&request.client_id),
        urlencoding::encode(&request.redirect_uri),
    );

    let optional = [
        ("scope", &request.scope),
        ("state", &request.state),
        ("prompt", &request.prompt),
        ("code_challenge", &request.code_challenge),
        ("code_challenge_method", &request.code_challenge_method),
    ];

    for (name, value) in optional {
        if let Some(value) = value {
            write!(&mut url, "&{name}={}", urlencoding::encode(value)).ok();
        }
    }

    url
}

/// Build the success redirect carrying code and state
fn code_redirect_url(redirect_uri: &str, code: &str, state: Option<&str>) -> String {
    let mut url = format!("{redirect_uri}?code={code}");
    if let Some(state) = state {
        write!(&mut url, "&state={}", urlencoding::encode(state)).ok();
    }
    url
}

/// Map an authorization error to its HTTP shape: a client redirect when the
/// redirect URI was validated, an inline JSON error otherwise
fn authorize_error_response(error: &AuthorizeError) -> Response {
    match &error.redirect {
        Some(target) => {
            let mut url = format!(
                "{}?error={}",
                target.redirect_uri,
                urlencoding::encode(&error.error.error)
            );
            if let Some(description) = &error.error.error_description {
                write!(&mut url, "&error_description={}", urlencoding::encode(description)).ok();
            }
            if let Some(state) = &target.state {
                write!(&mut url, "&state={}", urlencoding::encode(state)).ok();
            }
            redirect(&url)
        }
        None => (StatusCode::BAD_REQUEST, Json(error.error.clone())).into_response(),
    }
}

/// 302 redirect response per the OAuth 2.0 front-channel convention
fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

/// Extract a bearer token from the Authorization header
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

/// 401 challenge carrying the RFC 6750 WWW-Authenticate header
fn bearer_challenge(error: &OAuth2Error) -> Response {
    let challenge = format!(r#"Bearer error="{}""#, error.error);
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        Json(error.clone()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_parse_authorize_request_requires_client_id() {
        let err = parse_authorize_request(&params(&[
            ("response_type", "code"),
            ("redirect_uri", "https://localhost:7001/signin-oidc"),
        ]))
        .unwrap_err();
        assert_eq!(err.error, "invalid_request");
    }

    #[test]
    fn test_parse_consent_form_remember_variants() {
        for value in ["true", "on", "1"] {
            let form = parse_consent_form(&params(&[
                ("action", "allow"),
                ("client_id", "web-client"),
                ("redirect_uri", "https://localhost:7001/signin-oidc"),
                ("remember_consent", value),
            ]))
            .unwrap();
            assert!(form.remember_consent, "value {value} should set remember");
        }

        let form = parse_consent_form(&params(&[
            ("action", "allow"),
            ("client_id", "web-client"),
            ("redirect_uri", "https://localhost:7001/signin-oidc"),
        ]))
        .unwrap();
        assert!(!form.remember_consent);
    }

    #[test]
    fn test_build_return_url_preserves_parameters() {
        let request = AuthorizeRequest {
            response_type: "code".to_owned(),
            client_id: "web-client".to_owned(),
            redirect_uri: "https://localhost:7001/signin-oidc".to_owned(),
            scope: Some("openid profile email".to_owned()),
            state: Some("xyz".to_owned()),
            prompt: None,
            code_challenge: None,
            code_challenge_method: None,
        };

        let url = build_return_url(&request);
        assert!(url.starts_with("/connect/authorize?response_type=code"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains("state=xyz"));
        assert!(!url.contains("prompt="));
    }

    #[test]
    fn test_code_redirect_url_shape() {
        let url = code_redirect_url(
            "https://localhost:7001/signin-oidc",
            "abc123",
            Some("state-1"),
        );
        assert_eq!(
            url,
            "https://localhost:7001/signin-oidc?code=abc123&state=state-1"
        );
    }
}
