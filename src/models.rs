// ABOUTME: Core data models for the identity server user store
// ABOUTME: Defines the User record and helpers consumed by the OIDC core
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

//! # Data Models
//!
//! The user store record consumed by the OIDC core. The core never mutates
//! users; it reads them to build claim sets and to re-check sign-in
//! eligibility during token exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account in the identity store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,
    /// Login/email address (unique)
    pub email: String,
    /// Whether the email address has been confirmed
    pub email_verified: bool,
    /// Username shown as `preferred_username`
    pub username: String,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Bcrypt hash of the user's password
    pub password_hash: String,
    /// Rotated whenever credentials change; invalidates outstanding sessions.
    /// Never emitted into any issued token.
    pub security_stamp: String,
    /// Whether the account may sign in (cleared when disabled or locked out)
    pub is_active: bool,
    /// Lockout expiry, if the account is temporarily locked
    pub lockout_end: Option<DateTime<Utc>>,
    /// Role names assigned to the user
    pub roles: Vec<String>,
    /// Extra (type, value) claims stored for the user
    pub extra_claims: Vec<(String, String)>,
    /// When this account was created
    pub created_at: DateTime<Utc>,
    /// Last successful interactive login, if any
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Full display name assembled from first/last name
    #[must_use]
    pub fn full_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => String::new(),
        }
    }

    /// Whether the user is currently allowed to sign in
    #[must_use]
    pub fn can_sign_in(&self) -> bool {
        if !self.is_active {
            return false;
        }
        match self.lockout_end {
            Some(end) => end <= Utc::now(),
            None => true,
        }
    }
}
