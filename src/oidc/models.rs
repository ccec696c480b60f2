// ABOUTME: OAuth2/OIDC data models for authorization, consent, and token exchange
// ABOUTME: Wire-level request/response structures and persisted protocol records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scopes treated as standard by the claim filter; anything else counts as a
/// custom scope for the default-claim rule.
pub const STANDARD_SCOPES: [&str; 4] = ["openid", "profile", "email", "roles"];

/// Client application type (RFC 6749 Section 2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// Holds a secret and authenticates on the token endpoint
    Confidential,
    /// Cannot hold a secret; authenticates via PKCE
    Public,
}

impl ClientType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confidential => "confidential",
            Self::Public => "public",
        }
    }

    /// Parse from the stored string form
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "public" => Self::Public,
            _ => Self::Confidential,
        }
    }
}

/// How consent is collected for a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentType {
    /// The user must approve once; the stored grant covers later requests
    Explicit,
    /// No consent UI is ever shown
    Implicit,
    /// Grants are provisioned by an administrator; users cannot self-serve
    External,
    /// The consent UI is shown on every authorization request
    Systematic,
}

impl ConsentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Implicit => "implicit",
            Self::External => "external",
            Self::Systematic => "systematic",
        }
    }

    /// Parse from the stored string form
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "implicit" => Self::Implicit,
            "external" => Self::External,
            "systematic" => Self::Systematic,
            _ => Self::Explicit,
        }
    }
}

/// Stored OAuth 2.0 client application
#[derive(Debug, Clone)]
pub struct Client {
    /// Internal database ID
    pub id: String,
    /// OAuth 2.0 client identifier
    pub client_id: String,
    /// Argon2 hash of the client secret; `None` for public clients
    pub client_secret_hash: Option<String>,
    /// Confidential or public
    pub client_type: ClientType,
    /// Human-readable application name shown on the consent form
    pub display_name: String,
    /// Registered redirect URIs for the authorization code flow
    pub redirect_uris: Vec<String>,
    /// Registered post-logout redirect URIs
    pub post_logout_redirect_uris: Vec<String>,
    /// Consent collection mode
    pub consent_type: ConsentType,
    /// Scopes this client may request
    pub allowed_scopes: Vec<String>,
    /// Grant types this client may use on the token endpoint
    pub allowed_grant_types: Vec<String>,
    /// Whether authorization requests must carry a PKCE challenge
    pub requires_pkce: bool,
    /// When this client was provisioned
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Whether the given grant type is allowed for this client
    #[must_use]
    pub fn allows_grant(&self, grant_type: &str) -> bool {
        self.allowed_grant_types.iter().any(|g| g == grant_type)
    }

    /// Whether every requested scope is within the client's allowed set.
    /// `openid` is implicitly allowed for any client that may use the
    /// authorization endpoint.
    #[must_use]
    pub fn allows_scopes(&self, requested: &[String]) -> bool {
        requested
            .iter()
            .all(|s| s == "openid" || self.allowed_scopes.iter().any(|a| a == s))
    }
}

/// Registered scope definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    /// Unique scope name
    pub name: String,
    /// Display name shown on the consent form
    pub display_name: String,
    /// Human-readable description
    pub description: String,
    /// Audience (resource server) identifiers embedded in access tokens
    pub resources: Vec<String>,
}

/// Status of a stored authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Valid,
    Revoked,
}

impl AuthorizationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Revoked => "revoked",
        }
    }

    /// Parse from the stored string form
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "revoked" => Self::Revoked,
            _ => Self::Valid,
        }
    }
}

/// Kind of stored authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationType {
    /// Survives the issuing request and enables consent skipping
    Permanent,
    /// Scoped to a single flow
    AdHoc,
}

impl AuthorizationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::AdHoc => "ad-hoc",
        }
    }

    /// Parse from the stored string form
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "ad-hoc" => Self::AdHoc,
            _ => Self::Permanent,
        }
    }
}

/// Stored permanent authorization (consent grant)
#[derive(Debug, Clone)]
pub struct Authorization {
    /// Internal identifier, bound into issued authorization codes
    pub id: String,
    /// User the grant belongs to
    pub subject: Uuid,
    /// Client the grant was issued to
    pub client_id: String,
    /// Valid or revoked
    pub status: AuthorizationStatus,
    /// Permanent or ad-hoc
    pub auth_type: AuthorizationType,
    /// Scopes covered by the grant
    pub scopes: Vec<String>,
    /// When the grant was created
    pub created_at: DateTime<Utc>,
}

impl Authorization {
    /// Whether this grant covers every scope in `requested`
    #[must_use]
    pub fn covers(&self, requested: &[String]) -> bool {
        requested.iter().all(|s| self.scopes.iter().any(|g| g == s))
    }
}

/// Stored single-use authorization code
#[derive(Debug, Clone)]
pub struct AuthCodeRecord {
    /// The opaque code value
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// User who authorized the code
    pub subject: Uuid,
    /// Permanent authorization this code references
    pub authorization_id: String,
    /// Redirect URI that must match during token exchange
    pub redirect_uri: String,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// PKCE code challenge (RFC 7636), if the request carried one
    pub code_challenge: Option<String>,
    /// PKCE code challenge method
    pub code_challenge_method: Option<String>,
    /// When this code expires
    pub expires_at: DateTime<Utc>,
    /// Whether this code has been exchanged for tokens
    pub used: bool,
    /// When this code was issued
    pub created_at: DateTime<Utc>,
}

/// Stored refresh token
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    /// The opaque token value
    pub token: String,
    /// Client the token was issued to
    pub client_id: String,
    /// User who owns the token
    pub subject: Uuid,
    /// Permanent authorization this token references, if any
    pub authorization_id: Option<String>,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// When this token expires
    pub expires_at: DateTime<Utc>,
    /// When this token was created
    pub created_at: DateTime<Utc>,
    /// Whether this token has been rotated away or revoked
    pub revoked: bool,
}

/// OAuth 2.0 / OIDC authorization request (query or form encoded)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    /// Response type; only `code` is supported
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI for the response
    pub redirect_uri: String,
    /// Requested scopes, space separated
    pub scope: Option<String>,
    /// State parameter echoed back to the client
    pub state: Option<String>,
    /// OIDC prompt parameter (`none`, `consent`, space separated)
    pub prompt: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (only S256 is accepted)
    pub code_challenge_method: Option<String>,
}

impl AuthorizeRequest {
    /// Requested scopes as a list
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_owned)
            .collect()
    }

    /// Whether the prompt parameter contains the given value
    #[must_use]
    pub fn has_prompt(&self, value: &str) -> bool {
        self.prompt
            .as_deref()
            .is_some_and(|p| p.split_whitespace().any(|v| v == value))
    }
}

/// Consent form submission (POST /connect/consent)
///
/// Carries the original authorization parameters forwarded by the consent UI.
/// Every forwarded value is re-validated against the registries before any
/// grant is created; nothing from the first round-trip is trusted.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentForm {
    /// `allow` or `deny`
    pub action: String,
    /// Whether to store a permanent authorization
    #[serde(default)]
    pub remember_consent: bool,
    /// Forwarded client identifier
    pub client_id: String,
    /// Forwarded redirect URI
    pub redirect_uri: String,
    /// Forwarded scope list, space separated
    pub scope: Option<String>,
    /// Forwarded state
    pub state: Option<String>,
    /// Forwarded PKCE challenge
    pub code_challenge: Option<String>,
    /// Forwarded PKCE challenge method
    pub code_challenge_method: Option<String>,
}

impl ConsentForm {
    /// Rebuild the authorization request this consent answers
    #[must_use]
    pub fn to_authorize_request(&self) -> AuthorizeRequest {
        AuthorizeRequest {
            response_type: "code".to_owned(),
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scope: self.scope.clone(),
            state: self.state.clone(),
            prompt: None,
            code_challenge: self.code_challenge.clone(),
            code_challenge_method: self.code_challenge_method.clone(),
        }
    }
}

/// Scope description shown on the consent form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeDescription {
    /// Scope name
    pub name: String,
    /// Display name
    pub display_name: String,
    /// Human-readable description
    pub description: String,
}

/// Consent view returned to the consent-collection UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentView {
    /// Application display name
    pub application_name: String,
    /// Requested scopes, space separated
    pub scope: String,
    /// Requested scopes as a list
    pub scopes: Vec<String>,
    /// Per-scope descriptions
    pub scope_descriptions: Vec<ScopeDescription>,
}

/// OAuth 2.0 token request (form encoded)
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// Grant type (`authorization_code`, `client_credentials`, `refresh_token`)
    pub grant_type: String,
    /// Authorization code (for `authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI (must match the value from the authorization request)
    pub redirect_uri: Option<String>,
    /// Client ID
    pub client_id: String,
    /// Client secret (confidential clients only)
    pub client_secret: Option<String>,
    /// Requested scopes (for `client_credentials` grant)
    pub scope: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
    /// PKCE code verifier (RFC 7636, for `authorization_code` grant)
    pub code_verifier: Option<String>,
}

impl TokenRequest {
    /// Requested scopes as a list
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_owned)
            .collect()
    }
}

/// OAuth 2.0 token response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token (JWT)
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Expires in seconds
    pub expires_in: i64,
    /// Scopes granted, space separated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Identity token (JWT), present when `openid` was granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Refresh token, absent for `client_credentials` grants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// OAuth 2.0 / OIDC error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Error {
    /// Error code, preserved verbatim for client compatibility
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI for error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuth2Error {
    fn new(error: &str, description: &str, uri: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(uri.to_owned()),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::new(
            "invalid_request",
            description,
            "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1",
        )
    }

    /// Create an `invalid_client` error
    ///
    /// Deliberately carries a fixed description: the caller must not learn
    /// whether the client was unknown or the secret was wrong.
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new(
            "invalid_client",
            "Client authentication failed",
            "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2",
        )
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::new(
            "invalid_grant",
            description,
            "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2",
        )
    }

    /// Create an `unauthorized_client` error
    #[must_use]
    pub fn unauthorized_client(description: &str) -> Self {
        Self::new(
            "unauthorized_client",
            description,
            "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1",
        )
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            "unsupported_grant_type",
            "Grant type not supported",
            "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2",
        )
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(description: &str) -> Self {
        Self::new(
            "invalid_scope",
            description,
            "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1",
        )
    }

    /// Create an `access_denied` error
    #[must_use]
    pub fn access_denied(description: &str) -> Self {
        Self::new(
            "access_denied",
            description,
            "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1",
        )
    }

    /// Create a `login_required` error (OIDC Core 3.1.2.6)
    #[must_use]
    pub fn login_required(description: &str) -> Self {
        Self::new(
            "login_required",
            description,
            "https://openid.net/specs/openid-connect-core-1_0.html#AuthError",
        )
    }

    /// Create a `consent_required` error (OIDC Core 3.1.2.6)
    #[must_use]
    pub fn consent_required(description: &str) -> Self {
        Self::new(
            "consent_required",
            description,
            "https://openid.net/specs/openid-connect-core-1_0.html#AuthError",
        )
    }

    /// Create an `invalid_token` error (RFC 6750)
    #[must_use]
    pub fn invalid_token(description: &str) -> Self {
        Self::new(
            "invalid_token",
            description,
            "https://datatracker.ietf.org/doc/html/rfc6750#section-3.1",
        )
    }

    /// Create a `server_error` error
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(
            "server_error",
            "An internal error has occurred",
            "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1",
        )
    }
}
