// ABOUTME: Consent form retrieval endpoint for the consent-collection UI
// ABOUTME: Reconstructs and re-validates the pending request from a return URL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use crate::errors::AppError;
use crate::oidc::models::{AuthorizeRequest, OAuth2Error};
use crate::resources::ServerResources;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Query parameters for consent form retrieval
#[derive(Debug, Deserialize)]
pub struct ConsentQuery {
    /// The pending authorization request, forwarded as a relative URL
    #[serde(rename = "returnUrl")]
    pub return_url: String,
}

/// Consent form retrieval routes
pub struct ConsentRoutes;

impl ConsentRoutes {
    /// Create the consent retrieval route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/consent", get(Self::handle_get_consent_form))
            .with_state(resources)
    }

    /// Handle GET /consent?returnUrl=...
    ///
    /// The consent UI hands back the URL it was given; the pending request is
    /// reconstructed from its query string and re-validated in full before
    /// any scope descriptions are returned.
    async fn handle_get_consent_form(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ConsentQuery>,
    ) -> Response {
        if resources.session_manager.authenticate(&headers).is_none() {
            return AppError::auth_required().into_response();
        }

        let request = match parse_return_url(&query.return_url) {
            Ok(request) => request,
            Err(error) => return (StatusCode::BAD_REQUEST, Json(error)).into_response(),
        };

        match resources.authorization_flow.consent_view(&request).await {
            Ok(view) => (StatusCode::OK, Json(view)).into_response(),
            Err(error) => (StatusCode::BAD_REQUEST, Json(error.error)).into_response(),
        }
    }
}

/// Parse the forwarded return URL back into an authorization request
fn parse_return_url(return_url: &str) -> Result<AuthorizeRequest, OAuth2Error> {
    let (path, query) = return_url
        .split_once('?')
        .ok_or_else(|| OAuth2Error::invalid_request("Return URL carries no query string"))?;

    if !path.ends_with("/connect/authorize") {
        return Err(OAuth2Error::invalid_request(
            "Return URL does not target the authorization endpoint",
        ));
    }

    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

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
