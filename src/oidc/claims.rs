// ABOUTME: Claims projection for token and userinfo issuance
// ABOUTME: Claim assembly from the user store, scope filtering, and per-type token destinations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use super::models::STANDARD_SCOPES;
use crate::models::User;
use std::collections::HashMap;

/// Claim type names used throughout the core
pub mod claim_types {
    pub const SUBJECT: &str = "sub";
    pub const NAME: &str = "name";
    pub const GIVEN_NAME: &str = "given_name";
    pub const FAMILY_NAME: &str = "family_name";
    pub const PREFERRED_USERNAME: &str = "preferred_username";
    pub const EMAIL: &str = "email";
    pub const EMAIL_VERIFIED: &str = "email_verified";
    pub const ROLE: &str = "role";
    pub const PERMISSION: &str = "permission";
    pub const USER_ID: &str = "user_id";
    pub const CREATED_AT: &str = "created_at";
    pub const LAST_LOGIN_AT: &str = "last_login_at";
    pub const SECURITY_STAMP: &str = "security_stamp";
    pub const CATALOG_ACCESS: &str = "catalog_access";
}

/// Timestamp format used for `created_at` / `last_login_at` claim values
pub const CLAIM_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Which issued token a claim is embedded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    AccessToken,
    IdentityToken,
}

/// A typed key/value fact about the authenticated subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Claim type name
    pub claim_type: String,
    /// Claim value, stringly typed on the wire
    pub value: String,
}

impl Claim {
    /// Create a claim
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Ephemeral claim set derived per request, never persisted
#[derive(Debug, Clone)]
pub struct ClaimsSet {
    /// Filtered claims
    pub claims: Vec<Claim>,
    /// Scopes the set was filtered against; drives destinations
    pub scopes: Vec<String>,
}

impl ClaimsSet {
    /// All values for a claim type
    #[must_use]
    pub fn values_of(&self, claim_type: &str) -> Vec<&str> {
        self.claims
            .iter()
            .filter(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
            .collect()
    }

    /// First value for a claim type, if present
    #[must_use]
    pub fn first_value(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }
}

/// Gate controlling when a claim type also reaches the identity token
#[derive(Debug, Clone, Copy)]
enum IdentityGate {
    /// Identity token inclusion requires the named scope on the grant
    WithScope(&'static str),
}

/// Static destination table: claim type → identity-token gate.
/// Claim types absent from the table default to access-token only; secret
/// claim types are excluded from both tokens unconditionally.
const DESTINATION_TABLE: &[(&str, IdentityGate)] = &[
    (claim_types::NAME, IdentityGate::WithScope("profile")),
    (claim_types::GIVEN_NAME, IdentityGate::WithScope("profile")),
    (claim_types::FAMILY_NAME, IdentityGate::WithScope("profile")),
    (
        claim_types::PREFERRED_USERNAME,
        IdentityGate::WithScope("profile"),
    ),
    (claim_types::EMAIL, IdentityGate::WithScope("email")),
    (claim_types::EMAIL_VERIFIED, IdentityGate::WithScope("email")),
    (claim_types::ROLE, IdentityGate::WithScope("roles")),
    (claim_types::PERMISSION, IdentityGate::WithScope("roles")),
    (claim_types::USER_ID, IdentityGate::WithScope("profile")),
    (claim_types::CREATED_AT, IdentityGate::WithScope("profile")),
    (
        claim_types::LAST_LOGIN_AT,
        IdentityGate::WithScope("profile"),
    ),
];

/// Claim types that must never be emitted into any issued token.
/// This is a hard invariant, not a default.
const SECRET_CLAIM_TYPES: &[&str] = &[claim_types::SECURITY_STAMP];

/// Compute the destinations for a claim type under the given granted scopes.
///
/// Pure function over the static table so the secret-exclusion rule stays
/// unit-testable in isolation.
#[must_use]
pub fn destinations(claim_type: &str, granted_scopes: &[String]) -> Vec<TokenKind> {
    if SECRET_CLAIM_TYPES.contains(&claim_type) {
        return Vec::new();
    }

    let has_scope = |s: &str| granted_scopes.iter().any(|g| g == s);

    match DESTINATION_TABLE
        .iter()
        .find(|(t, _)| *t == claim_type)
        .map(|(_, gate)| gate)
    {
        Some(IdentityGate::WithScope(scope)) if has_scope(scope) => {
            vec![TokenKind::AccessToken, TokenKind::IdentityToken]
        }
        _ => vec![TokenKind::AccessToken],
    }
}

/// Role → permission mapping, injected at projector construction so
/// deployments can extend roles without touching core logic
#[derive(Debug, Clone)]
pub struct RolePermissions {
    map: HashMap<String, Vec<String>>,
}

impl RolePermissions {
    /// Build from an explicit role → permissions map
    #[must_use]
    pub fn from_map(map: HashMap<String, Vec<String>>) -> Self {
        Self { map }
    }

    /// Permissions granted by a set of roles, deduplicated in stable order
    #[must_use]
    pub fn permissions_for(&self, roles: &[String]) -> Vec<String> {
        let mut permissions = Vec::new();
        for role in roles {
            if let Some(role_permissions) = self.map.get(&role.to_lowercase()) {
                for permission in role_permissions {
                    if !permissions.contains(permission) {
                        permissions.push(permission.clone());
                    }
                }
            }
        }
        permissions
    }
}

impl Default for RolePermissions {
    /// The shipped role table: `admin` gets full CRUD across users, catalog
    /// and orders plus system administration; `user` gets catalog read,
    /// orders read/write and profile read/write.
    fn default() -> Self {
        let mut map = HashMap::new();
        map.insert(
            "admin".to_owned(),
            vec![
                "users.read".to_owned(),
                "users.write".to_owned(),
                "users.delete".to_owned(),
                "catalog.read".to_owned(),
                "catalog.write".to_owned(),
                "catalog.delete".to_owned(),
                "orders.read".to_owned(),
                "orders.write".to_owned(),
                "orders.delete".to_owned(),
                "system.admin".to_owned(),
            ],
        );
        map.insert(
            "user".to_owned(),
            vec![
                "catalog.read".to_owned(),
                "orders.read".to_owned(),
                "orders.write".to_owned(),
                "profile.read".to_owned(),
                "profile.write".to_owned(),
            ],
        );
        Self { map }
    }
}

/// Builds and filters claim sets for token and userinfo issuance
pub struct ClaimsProjector {
    role_permissions: RolePermissions,
}

impl ClaimsProjector {
    /// Create a projector with the given role → permission configuration
    #[must_use]
    pub fn new(role_permissions: RolePermissions) -> Self {
        Self { role_permissions }
    }

    /// Permissions derived from the given roles
    #[must_use]
    pub fn permissions_for_roles(&self, roles: &[String]) -> Vec<String> {
        self.role_permissions.permissions_for(roles)
    }

    /// Assemble the full claim set for a user: standard OIDC claims, custom
    /// claims, one claim per role, one per derived permission, plus any extra
    /// claims stored for the user.
    #[must_use]
    pub fn build_claims(&self, user: &User) -> Vec<Claim> {
        let mut claims = vec![
            Claim::new(claim_types::SUBJECT, user.id.to_string()),
            Claim::new(claim_types::NAME, user.full_name()),
            Claim::new(
                claim_types::GIVEN_NAME,
                user.first_name.clone().unwrap_or_default(),
            ),
            Claim::new(
                claim_types::FAMILY_NAME,
                user.last_name.clone().unwrap_or_default(),
            ),
            Claim::new(claim_types::PREFERRED_USERNAME, user.username.clone()),
            Claim::new(claim_types::EMAIL, user.email.clone()),
            Claim::new(
                claim_types::EMAIL_VERIFIED,
                if user.email_verified { "true" } else { "false" },
            ),
            Claim::new(claim_types::USER_ID, user.id.to_string()),
            Claim::new(
                claim_types::CREATED_AT,
                user.created_at.format(CLAIM_TIMESTAMP_FORMAT).to_string(),
            ),
        ];

        if let Some(last_login) = user.last_login_at {
            claims.push(Claim::new(
                claim_types::LAST_LOGIN_AT,
                last_login.format(CLAIM_TIMESTAMP_FORMAT).to_string(),
            ));
        }

        for role in &user.roles {
            claims.push(Claim::new(claim_types::ROLE, role.clone()));
        }

        for permission in self.role_permissions.permissions_for(&user.roles) {
            claims.push(Claim::new(claim_types::PERMISSION, permission));
        }

        for (claim_type, value) in &user.extra_claims {
            claims.push(Claim::new(claim_type.clone(), value.clone()));
        }

        tracing::debug!(
            user_id = %user.id,
            claim_count = claims.len(),
            "Assembled user claims"
        );

        claims
    }

    /// Filter a claim set down to what the requested scopes permit.
    ///
    /// Subject claims always pass; profile/email/roles claims require their
    /// scope; claim types outside the recognized set pass only when at least
    /// one non-standard scope was requested.
    #[must_use]
    pub fn filter_by_scope(claims: Vec<Claim>, requested_scopes: &[String]) -> Vec<Claim> {
        let has_scope = |s: &str| requested_scopes.iter().any(|g| g == s);
        let any_custom_scope = requested_scopes
            .iter()
            .any(|s| !STANDARD_SCOPES.contains(&s.as_str()));

        claims
            .into_iter()
            .filter(|claim| match claim.claim_type.as_str() {
                claim_types::SUBJECT | claim_types::USER_ID => true,
                claim_types::NAME
                | claim_types::GIVEN_NAME
                | claim_types::FAMILY_NAME
                | claim_types::PREFERRED_USERNAME
                | claim_types::CREATED_AT
                | claim_types::LAST_LOGIN_AT => has_scope("profile"),
                claim_types::EMAIL | claim_types::EMAIL_VERIFIED => has_scope("email"),
                claim_types::ROLE | claim_types::PERMISSION => has_scope("roles"),
                claim_types::CATALOG_ACCESS => has_scope("catalog"),
                _ => any_custom_scope,
            })
            .collect()
    }

    /// Build and filter in one step, yielding the claim set bound to a grant
    #[must_use]
    pub fn project(&self, user: &User, scopes: &[String]) -> ClaimsSet {
        let claims = Self::filter_by_scope(self.build_claims(user), scopes);
        ClaimsSet {
            claims,
            scopes: scopes.to_vec(),
        }
    }
}
