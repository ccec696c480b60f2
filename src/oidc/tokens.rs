// ABOUTME: Token issuance for the authorization server
// ABOUTME: Signed access/identity JWTs, opaque codes and refresh tokens, bearer validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use super::claims::{claim_types, destinations, ClaimsSet, TokenKind};
use super::models::OAuth2Error;
use crate::config::environment::OidcServerConfig;
use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims carried by issued access tokens, as read back on validation
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: user id, or client id for `client_credentials` tokens
    pub sub: String,
    /// Issuer URL
    #[serde(default)]
    pub iss: String,
    /// Client the token was issued to
    #[serde(default)]
    pub client_id: String,
    /// Granted scopes, space separated
    #[serde(default)]
    pub scope: String,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued-at timestamp
    #[serde(default)]
    pub iat: i64,
}

impl AccessTokenClaims {
    /// Granted scopes as a list
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_owned).collect()
    }
}

/// Issues and validates the credentials minted by the server
///
/// Access and identity tokens are stateless signed JWTs; authorization codes
/// and refresh tokens are opaque random values whose state lives in storage.
pub struct TokenIssuer {
    config: OidcServerConfig,
}

impl TokenIssuer {
    /// Create an issuer from the OIDC server configuration
    #[must_use]
    pub const fn new(config: OidcServerConfig) -> Self {
        Self { config }
    }

    /// Access token lifetime in seconds
    #[must_use]
    pub const fn access_token_ttl_secs(&self) -> i64 {
        self.config.access_token_ttl_secs
    }

    /// Authorization code expiry from the given instant
    #[must_use]
    pub fn code_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.config.auth_code_ttl_secs)
    }

    /// Refresh token expiry from the given instant
    #[must_use]
    pub fn refresh_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.config.refresh_token_ttl_days)
    }

    /// Generate an opaque authorization code
    ///
    /// # Errors
    /// Returns an error if the system RNG fails; the server cannot operate
    /// securely without working RNG
    pub fn generate_code(&self) -> Result<String> {
        Self::generate_random_string(32)
    }

    /// Generate an opaque refresh token value
    ///
    /// # Errors
    /// Returns an error if the system RNG fails
    pub fn generate_refresh_token_value(&self) -> Result<String> {
        Self::generate_random_string(32)
    }

    /// Issue a signed access token embedding the claims whose destination
    /// includes the access token
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails
    pub fn issue_access_token(
        &self,
        subject: &str,
        client_id: &str,
        claims: &ClaimsSet,
        resources: &[String],
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.access_token_ttl_secs);

        let mut payload = Map::new();
        payload.insert("iss".to_owned(), Value::String(self.config.issuer_url.clone()));
        payload.insert("sub".to_owned(), Value::String(subject.to_owned()));
        payload.insert("client_id".to_owned(), Value::String(client_id.to_owned()));
        payload.insert("scope".to_owned(), Value::String(claims.scopes.join(" ")));
        payload.insert("iat".to_owned(), Value::from(now.timestamp()));
        payload.insert("exp".to_owned(), Value::from(exp.timestamp()));
        payload.insert("aud".to_owned(), Self::audience_value(client_id, resources));

        Self::embed_claims(&mut payload, claims, TokenKind::AccessToken);

        self.sign(&payload)
    }

    /// Issue a signed identity token embedding the claims whose destination
    /// includes the identity token. The audience is the client itself.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails
    pub fn issue_identity_token(
        &self,
        subject: &str,
        client_id: &str,
        claims: &ClaimsSet,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.identity_token_ttl_secs);

        let mut payload = Map::new();
        payload.insert("iss".to_owned(), Value::String(self.config.issuer_url.clone()));
        payload.insert("sub".to_owned(), Value::String(subject.to_owned()));
        payload.insert("aud".to_owned(), Value::String(client_id.to_owned()));
        payload.insert("iat".to_owned(), Value::from(now.timestamp()));
        payload.insert("exp".to_owned(), Value::from(exp.timestamp()));

        Self::embed_claims(&mut payload, claims, TokenKind::IdentityToken);

        self.sign(&payload)
    }

    /// Validate a bearer access token and return its claims
    ///
    /// # Errors
    /// Returns `invalid_token` when the signature, expiry or issuer check fails
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, OAuth2Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Audience varies per resource server; scope gating happens downstream
        validation.validate_aud = false;

        let token_data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.config.signing_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("Access token validation failed: {}", e);
            OAuth2Error::invalid_token("The specified access token is no longer valid.")
        })?;

        if token_data.claims.iss != self.config.issuer_url {
            tracing::warn!(
                issuer = %token_data.claims.iss,
                "Access token carries a foreign issuer"
            );
            return Err(OAuth2Error::invalid_token(
                "The specified access token is no longer valid.",
            ));
        }

        Ok(token_data.claims)
    }

    /// Merge destination-matching claims into the payload, folding repeated
    /// claim types (roles, permissions) into arrays
    fn embed_claims(payload: &mut Map<String, Value>, claims: &ClaimsSet, kind: TokenKind) {
        for claim in &claims.claims {
            // `sub` is set explicitly on every token
            if claim.claim_type == claim_types::SUBJECT {
                continue;
            }
            if !destinations(&claim.claim_type, &claims.scopes).contains(&kind) {
                continue;
            }

            let value = Value::String(claim.value.clone());
            match payload.get_mut(&claim.claim_type) {
                None => {
                    payload.insert(claim.claim_type.clone(), value);
                }
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            }
        }
    }

    fn audience_value(client_id: &str, resources: &[String]) -> Value {
        if resources.is_empty() {
            Value::String(client_id.to_owned())
        } else {
            Value::Array(
                resources
                    .iter()
                    .map(|r| Value::String(r.clone()))
                    .collect(),
            )
        }
    }

    fn sign(&self, payload: &Map<String, Value>) -> Result<String> {
        let token = encode(
            &Header::new(Algorithm::HS256),
            payload,
            &EncodingKey::from_secret(self.config.signing_secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Generate a URL-safe random string of `length` bytes of entropy
    ///
    /// # Errors
    /// Returns an error if the system RNG fails
    fn generate_random_string(length: usize) -> Result<String> {
        let rng = SystemRandom::new();
        let mut bytes = vec![0u8; length];

        rng.fill(&mut bytes).map_err(|e| {
            tracing::error!("System RNG failure - cannot generate secure random bytes: {:?}", e);
            anyhow::anyhow!("System RNG failure - server cannot operate securely")
        })?;

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oidc::claims::Claim;

    fn test_config() -> OidcServerConfig {
        OidcServerConfig {
            issuer_url: "http://localhost:8084".to_owned(),
            signing_secret: "test-signing-secret".to_owned(),
            access_token_ttl_secs: 3600,
            identity_token_ttl_secs: 1200,
            refresh_token_ttl_days: 14,
            auth_code_ttl_secs: 600,
        }
    }

    fn claims_set(scopes: &[&str], claims: Vec<Claim>) -> ClaimsSet {
        ClaimsSet {
            claims,
            scopes: scopes.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = TokenIssuer::new(test_config());
        let claims = claims_set(
            &["openid", "profile"],
            vec![Claim::new("name", "Jane Doe")],
        );

        let token = issuer
            .issue_access_token("user-1", "web-client", &claims, &[])
            .unwrap();
        let validated = issuer.validate_access_token(&token).unwrap();

        assert_eq!(validated.sub, "user-1");
        assert_eq!(validated.client_id, "web-client");
        assert_eq!(validated.scopes(), vec!["openid", "profile"]);
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let issuer = TokenIssuer::new(test_config());

        let mut other_config = test_config();
        other_config.issuer_url = "http://other-issuer.example".to_owned();
        let other = TokenIssuer::new(other_config);

        let claims = claims_set(&["openid"], vec![]);
        let token = other
            .issue_access_token("user-1", "web-client", &claims, &[])
            .unwrap();

        let err = issuer.validate_access_token(&token).unwrap_err();
        assert_eq!(err.error, "invalid_token");
    }

    #[test]
    fn test_garbage_token_rejected() {
        let issuer = TokenIssuer::new(test_config());
        let err = issuer.validate_access_token("not-a-jwt").unwrap_err();
        assert_eq!(err.error, "invalid_token");
    }

    #[test]
    fn test_generated_codes_are_unique() {
        let issuer = TokenIssuer::new(test_config());
        let a = issuer.generate_code().unwrap();
        let b = issuer.generate_code().unwrap();
        assert_ne!(a, b);
        assert!(a.len() >= 43);
    }
}
