// ABOUTME: Token endpoint grant dispatch and validation
// ABOUTME: authorization_code, client_credentials, and refresh_token grants with rotation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use super::claims::{claim_types, Claim, ClaimsProjector, ClaimsSet};
use super::clients::ClientRegistry;
use super::models::{Client, OAuth2Error, RefreshTokenRecord, TokenRequest, TokenResponse};
use super::scopes::ScopeRegistry;
use super::tokens::TokenIssuer;
use crate::models::User;
use crate::storage::StorageProvider;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Grant types this server understands at all
const SUPPORTED_GRANT_TYPES: [&str; 3] =
    ["authorization_code", "client_credentials", "refresh_token"];

/// The `/connect/token` endpoint logic
pub struct TokenExchange {
    storage: Arc<dyn StorageProvider>,
    clients: ClientRegistry,
    scopes: ScopeRegistry,
    projector: Arc<ClaimsProjector>,
    issuer: Arc<TokenIssuer>,
}

impl TokenExchange {
    /// Assemble the exchange over its collaborators
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageProvider>,
        issuer: Arc<TokenIssuer>,
        projector: Arc<ClaimsProjector>,
    ) -> Self {
        Self {
            clients: ClientRegistry::new(storage.clone()),
            scopes: ScopeRegistry::new(storage.clone()),
            storage,
            projector,
            issuer,
        }
    }

    /// Handle a token request
    ///
    /// # Errors
    /// Returns the OAuth error terminating the exchange
    pub async fn exchange(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        // Client authentication happens for every grant type before dispatch
        let client = self.clients.get_client(&request.client_id).await?;
        ClientRegistry::authenticate(&client, request.client_secret.as_deref())?;

        if !SUPPORTED_GRANT_TYPES.contains(&request.grant_type.as_str()) {
            return Err(OAuth2Error::unsupported_grant_type());
        }

        if !client.allows_grant(&request.grant_type) {
            return Err(OAuth2Error::unauthorized_client(
                "The client is not allowed to use this grant type",
            ));
        }

        match request.grant_type.as_str() {
            "authorization_code" => self.exchange_authorization_code(&client, request).await,
            "client_credentials" => self.exchange_client_credentials(&client, &request).await,
            "refresh_token" => self.exchange_refresh_token(&client, request).await,
            _ => Err(OAuth2Error::unsupported_grant_type()),
        }
    }

    /// Authorization code grant: consume the code, re-validate the user,
    /// re-derive claims fresh, issue the token set
    async fn exchange_authorization_code(
        &self,
        client: &Client,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = request
            .code
            .as_deref()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing authorization code"))?;
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing redirect_uri"))?;

        // Atomic consumption: reuse, expiry, client and redirect mismatches
        // all surface as one invalid_grant
        let auth_code = self
            .storage
            .consume_auth_code(code, &client.client_id, redirect_uri, Utc::now())
            .await
            .map_err(|e| {
                tracing::error!(
                    client_id = %client.client_id,
                    error = %e,
                    "Failed to consume authorization code"
                );
                OAuth2Error::server_error()
            })?
            .ok_or_else(|| {
                tracing::warn!(
                    client_id = %client.client_id,
                    "Authorization code rejected: not found, already used, expired, or mismatched"
                );
                OAuth2Error::invalid_grant("Invalid or expired authorization code")
            })?;

        // PKCE verification happens after consumption so a failed verifier
        // still burns the code
        Self::verify_pkce(
            auth_code.code_challenge.as_deref(),
            auth_code.code_challenge_method.as_deref(),
            request.code_verifier.as_deref(),
            &client.client_id,
        )?;

        let user = self.resolve_grant_user(auth_code.subject).await?;
        let claims = self.projector.project(&user, &auth_code.scopes);

        self.issue_token_set(
            client,
            &user.id.to_string(),
            &claims,
            Some(auth_code.authorization_id),
            user.id,
        )
        .await
    }

    /// Client credentials grant: the client is its own subject; no refresh
    /// token is issued — machine-to-machine grants are non-interactive and
    /// re-authenticate on every call
    async fn exchange_client_credentials(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let requested_scopes = request.scopes();
        if !client.allows_scopes(&requested_scopes) {
            return Err(OAuth2Error::invalid_scope(
                "The client is not allowed to request these scopes",
            ));
        }

        let claims = ClaimsSet {
            claims: vec![
                Claim::new(claim_types::SUBJECT, client.client_id.clone()),
                Claim::new(claim_types::NAME, client.display_name.clone()),
            ],
            scopes: requested_scopes.clone(),
        };

        let resources = self
            .scopes
            .resources_for(&requested_scopes)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Resource resolution failed");
                OAuth2Error::server_error()
            })?;

        let access_token = self
            .issuer
            .issue_access_token(&client.client_id, &client.client_id, &claims, &resources)
            .map_err(|e| {
                tracing::error!(
                    client_id = %client.client_id,
                    error = %e,
                    "Failed to generate client credentials access token"
                );
                OAuth2Error::server_error()
            })?;

        tracing::info!(client_id = %client.client_id, "Issued client credentials token");

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_owned(),
            expires_in: self.issuer.access_token_ttl_secs(),
            scope: request.scope.clone(),
            id_token: None,
            refresh_token: None,
        })
    }

    /// Refresh token grant: rotate the token, re-validate the user,
    /// re-derive claims fresh
    async fn exchange_refresh_token(
        &self,
        client: &Client,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let refresh_token_value = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing refresh_token"))?;

        let old_token = self
            .storage
            .consume_refresh_token(refresh_token_value, &client.client_id, Utc::now())
            .await
            .map_err(|e| {
                tracing::error!(
                    client_id = %client.client_id,
                    error = %e,
                    "Failed to consume refresh token"
                );
                OAuth2Error::server_error()
            })?
            .ok_or_else(|| {
                tracing::warn!(
                    client_id = %client.client_id,
                    "Refresh token rejected: not found, revoked, expired, or mismatched"
                );
                OAuth2Error::invalid_grant("Invalid or expired refresh token")
            })?;

        let user = self.resolve_grant_user(old_token.subject).await?;
        let claims = self.projector.project(&user, &old_token.scopes);

        let response = self
            .issue_token_set(
                client,
                &user.id.to_string(),
                &claims,
                old_token.authorization_id,
                user.id,
            )
            .await?;

        tracing::info!(
            client_id = %client.client_id,
            user_id = %user.id,
            "Refresh token rotated"
        );

        Ok(response)
    }

    /// Resolve the user bound to a grant and confirm they may still sign in
    async fn resolve_grant_user(&self, subject: Uuid) -> Result<User, OAuth2Error> {
        let user = self
            .storage
            .get_user(subject)
            .await
            .map_err(|e| {
                tracing::error!(subject = %subject, error = %e, "User lookup failed");
                OAuth2Error::server_error()
            })?
            .ok_or_else(|| OAuth2Error::invalid_grant("The token is no longer valid."))?;

        if !user.can_sign_in() {
            return Err(OAuth2Error::invalid_grant(
                "The user is no longer allowed to sign in.",
            ));
        }

        Ok(user)
    }

    /// Mint access + identity (+ refresh) tokens for a user grant
    async fn issue_token_set(
        &self,
        client: &Client,
        subject: &str,
        claims: &ClaimsSet,
        authorization_id: Option<String>,
        user_id: Uuid,
    ) -> Result<TokenResponse, OAuth2Error> {
        let resources = self
            .scopes
            .resources_for(&claims.scopes)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Resource resolution failed");
                OAuth2Error::server_error()
            })?;

        let access_token = self
            .issuer
            .issue_access_token(subject, &client.client_id, claims, &resources)
            .map_err(|e| {
                tracing::error!(
                    client_id = %client.client_id,
                    error = %e,
                    "Failed to generate access token"
                );
                OAuth2Error::server_error()
            })?;

        let id_token = if claims.scopes.iter().any(|s| s == "openid") {
            Some(
                self.issuer
                    .issue_identity_token(subject, &client.client_id, claims)
                    .map_err(|e| {
                        tracing::error!(
                            client_id = %client.client_id,
                            error = %e,
                            "Failed to generate identity token"
                        );
                        OAuth2Error::server_error()
                    })?,
            )
        } else {
            None
        };

        let refresh_token = if client.allows_grant("refresh_token") {
            let value = self.issuer.generate_refresh_token_value().map_err(|e| {
                tracing::error!(error = %e, "Failed to generate refresh token");
                OAuth2Error::server_error()
            })?;

            let now = Utc::now();
            let record = RefreshTokenRecord {
                token: value.clone(),
                client_id: client.client_id.clone(),
                subject: user_id,
                authorization_id,
                scopes: claims.scopes.clone(),
                expires_at: self.issuer.refresh_expiry(now),
                created_at: now,
                revoked: false,
            };

            self.storage.store_refresh_token(&record).await.map_err(|e| {
                tracing::error!(
                    client_id = %client.client_id,
                    error = %e,
                    "Failed to store refresh token"
                );
                OAuth2Error::server_error()
            })?;

            Some(value)
        } else {
            None
        };

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_owned(),
            expires_in: self.issuer.access_token_ttl_secs(),
            scope: Some(claims.scopes.join(" ")),
            id_token,
            refresh_token,
        })
    }

    /// Verify a PKCE code verifier against the stored challenge (RFC 7636)
    fn verify_pkce(
        stored_challenge: Option<&str>,
        stored_method: Option<&str>,
        code_verifier: Option<&str>,
        client_id: &str,
    ) -> Result<(), OAuth2Error> {
        let Some(challenge) = stored_challenge else {
            // No challenge was bound to the code; a stray verifier is a
            // protocol violation
            if code_verifier.is_some() {
                return Err(OAuth2Error::invalid_grant(
                    "code_verifier provided but no code_challenge was issued",
                ));
            }
            return Ok(());
        };

        let verifier = code_verifier
            .ok_or_else(|| OAuth2Error::invalid_grant("code_verifier is required (PKCE)"))?;

        if verifier.len() < 43 || verifier.len() > 128 {
            return Err(OAuth2Error::invalid_grant(
                "code_verifier must be between 43 and 128 characters",
            ));
        }

        if !verifier
            .chars()
            .all(|c| matches!(c, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~'))
        {
            return Err(OAuth2Error::invalid_grant(
                "code_verifier contains invalid characters",
            ));
        }

        let method = stored_method.unwrap_or("S256");
        if method != "S256" {
            return Err(OAuth2Error::invalid_grant(
                "Only S256 code_challenge_method is supported",
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let computed = general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());

        // Constant-time comparison to prevent timing attacks
        if computed.as_bytes().ct_eq(challenge.as_bytes()).into() {
            tracing::debug!("PKCE verification successful for client {}", client_id);
            Ok(())
        } else {
            tracing::warn!(
                "PKCE verification failed for client {} - verifier does not match challenge",
                client_id
            );
            Err(OAuth2Error::invalid_grant("Invalid code_verifier"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s256_challenge(verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXkabcdef";

    #[test]
    fn test_pkce_happy_path() {
        let challenge = s256_challenge(VERIFIER);
        assert!(TokenExchange::verify_pkce(
            Some(&challenge),
            Some("S256"),
            Some(VERIFIER),
            "web-client"
        )
        .is_ok());
    }

    #[test]
    fn test_pkce_wrong_verifier() {
        let challenge = s256_challenge(VERIFIER);
        let err = TokenExchange::verify_pkce(
            Some(&challenge),
            Some("S256"),
            Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            "web-client",
        )
        .unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[test]
    fn test_pkce_missing_verifier() {
        let challenge = s256_challenge(VERIFIER);
        let err =
            TokenExchange::verify_pkce(Some(&challenge), Some("S256"), None, "web-client")
                .unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[test]
    fn test_pkce_stray_verifier_rejected() {
        let err = TokenExchange::verify_pkce(None, None, Some(VERIFIER), "web-client").unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[test]
    fn test_pkce_short_verifier_rejected() {
        let challenge = s256_challenge("short");
        let err = TokenExchange::verify_pkce(
            Some(&challenge),
            Some("S256"),
            Some("short"),
            "web-client",
        )
        .unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }
}
