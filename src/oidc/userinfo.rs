// ABOUTME: Scope-gated userinfo projection for bearer-authenticated callers
// ABOUTME: Re-derives the claim map from the access token's scopes on every call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use super::claims::{ClaimsProjector, CLAIM_TIMESTAMP_FORMAT};
use super::models::OAuth2Error;
use super::tokens::TokenIssuer;
use crate::storage::StorageProvider;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// The `/connect/userinfo` endpoint logic
pub struct UserInfoService {
    storage: Arc<dyn StorageProvider>,
    projector: Arc<ClaimsProjector>,
    issuer: Arc<TokenIssuer>,
}

impl UserInfoService {
    /// Assemble the service over its collaborators
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageProvider>,
        issuer: Arc<TokenIssuer>,
        projector: Arc<ClaimsProjector>,
    ) -> Self {
        Self {
            storage,
            projector,
            issuer,
        }
    }

    /// Build the claim map for a bearer access token.
    ///
    /// `sub` is always present; everything else is gated by the scopes the
    /// token itself carries, not by anything remembered from grant time.
    ///
    /// # Errors
    /// Returns `invalid_token` when the token or its user is no longer valid
    pub async fn userinfo(&self, bearer_token: &str) -> Result<Value, OAuth2Error> {
        let token_claims = self.issuer.validate_access_token(bearer_token)?;
        let scopes = token_claims.scopes();

        // client_credentials tokens carry a client id as subject; there is
        // no user record behind them
        let user_id = Uuid::parse_str(&token_claims.sub).map_err(|_| {
            OAuth2Error::invalid_token("The specified access token is no longer valid.")
        })?;

        let user = self
            .storage
            .get_user(user_id)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "User lookup failed");
                OAuth2Error::server_error()
            })?
            .ok_or_else(|| {
                OAuth2Error::invalid_token("The specified access token is no longer valid.")
            })?;

        let has_scope = |s: &str| scopes.iter().any(|g| g == s);

        let mut claims = Map::new();
        // "sub" is mandatory in every userinfo response
        claims.insert("sub".to_owned(), json!(user.id.to_string()));

        if has_scope("email") {
            claims.insert("email".to_owned(), json!(user.email));
            claims.insert("email_verified".to_owned(), json!(user.email_verified));
        }

        if has_scope("profile") {
            claims.insert("name".to_owned(), json!(user.full_name()));
            claims.insert(
                "given_name".to_owned(),
                json!(user.first_name.clone().unwrap_or_default()),
            );
            claims.insert(
                "family_name".to_owned(),
                json!(user.last_name.clone().unwrap_or_default()),
            );
            claims.insert("preferred_username".to_owned(), json!(user.username));
            claims.insert(
                "created_at".to_owned(),
                json!(user.created_at.format(CLAIM_TIMESTAMP_FORMAT).to_string()),
            );
            if let Some(last_login) = user.last_login_at {
                claims.insert(
                    "last_login_at".to_owned(),
                    json!(last_login.format(CLAIM_TIMESTAMP_FORMAT).to_string()),
                );
            }
        }

        if has_scope("roles") {
            claims.insert("role".to_owned(), json!(user.roles));

            let permissions = self.projector.permissions_for_roles(&user.roles);
            if !permissions.is_empty() {
                claims.insert("permissions".to_owned(), json!(permissions));
            }
        }

        Ok(Value::Object(claims))
    }
}
