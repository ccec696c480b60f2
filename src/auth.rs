// ABOUTME: Session-cookie authentication for the authorization endpoint
// ABOUTME: Signed session JWTs, cookie parsing, and principal resolution
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

//! # Session Authentication
//!
//! The authorization endpoint resolves the resource owner from a session
//! cookie set by the external login collaborator. The cookie carries a signed
//! JWT; validating it yields the principal the OIDC core operates on.

use crate::config::environment::SessionConfig;
use crate::models::User;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience value stamped into session tokens so they can never be replayed
/// as access tokens
const SESSION_AUDIENCE: &str = "identity-session";

/// `JWT` validation error with detailed information
#[derive(Debug, Clone)]
pub enum JwtValidationError {
    /// Token has expired
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// Token signature is invalid
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is malformed (not proper `JWT` format)
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl std::fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenExpired { expired_at } => {
                write!(
                    f,
                    "Session token expired at {}",
                    expired_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
            Self::TokenInvalid { reason } => {
                write!(f, "Session token signature is invalid: {reason}")
            }
            Self::TokenMalformed { details } => {
                write!(f, "Session token is malformed: {details}")
            }
        }
    }
}

impl std::error::Error for JwtValidationError {}

/// `JWT` claims carried by session tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User `ID`
    pub sub: String,
    /// User email
    pub email: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Audience (who the token is intended for)
    pub aud: String,
}

/// The authenticated resource owner resolved from a session cookie
#[derive(Debug, Clone)]
pub struct SessionPrincipal {
    /// Authenticated user `ID`
    pub user_id: Uuid,
    /// Email recorded at login time
    pub email: String,
}

/// Manages signed session tokens and their cookie transport
pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    /// Create a session manager from configuration
    #[must_use]
    pub const fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Generate a session token for a user
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails
    pub fn generate_session_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let expiry = now + Duration::hours(self.config.expiry_hours);

        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            aud: SESSION_AUDIENCE.to_owned(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Validate a session token
    ///
    /// # Errors
    /// Returns a detailed validation error when the token is expired,
    /// tampered with, or malformed
    pub fn validate_session_token(
        &self,
        token: &str,
    ) -> Result<SessionClaims, JwtValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[SESSION_AUDIENCE]);

        match decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &validation,
        ) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(JwtValidationError::TokenExpired {
                        expired_at: Utc::now(),
                    })
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    Err(JwtValidationError::TokenInvalid {
                        reason: e.to_string(),
                    })
                }
                _ => Err(JwtValidationError::TokenMalformed {
                    details: e.to_string(),
                }),
            },
        }
    }

    /// Resolve the authenticated principal from request headers, if any.
    ///
    /// Absent or invalid sessions resolve to `None`; the authorization
    /// endpoint decides between a login challenge and `login_required`.
    #[must_use]
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<SessionPrincipal> {
        let cookie_header = headers.get(http::header::COOKIE)?.to_str().ok()?;
        let token = self.extract_session_token(cookie_header)?;

        match self.validate_session_token(&token) {
            Ok(claims) => match Uuid::parse_str(&claims.sub) {
                Ok(user_id) => Some(SessionPrincipal {
                    user_id,
                    email: claims.email,
                }),
                Err(_) => {
                    tracing::warn!("Invalid user ID format in session token: {}", claims.sub);
                    None
                }
            },
            Err(e) => {
                tracing::debug!("Session token rejected: {}", e);
                None
            }
        }
    }

    /// Build the Set-Cookie value for a session token.
    ///
    /// HttpOnly blocks script access, Secure enforces HTTPS, SameSite=Lax
    /// blocks cross-site posts; Max-Age matches the token expiry.
    #[must_use]
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={token}; HttpOnly; Secure; Path=/; SameSite=Lax; Max-Age={}",
            self.config.cookie_name,
            self.config.expiry_hours * 3600
        )
    }

    /// External login page with the original request preserved as the
    /// return target
    #[must_use]
    pub fn login_redirect_url(&self, return_url: &str) -> String {
        format!(
            "{}?returnUrl={}",
            self.config.login_url,
            urlencoding::encode(return_url)
        )
    }

    /// Extract the session token from a Cookie header value
    fn extract_session_token(&self, cookie_header: &str) -> Option<String> {
        let prefix = format!("{}=", self.config.cookie_name);
        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some(token) = cookie.strip_prefix(prefix.as_str()) {
                return Some(token.to_owned());
            }
        }
        None
    }
}
