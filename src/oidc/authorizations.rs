// ABOUTME: Permanent authorization store enabling consent-skip on repeat logins
// ABOUTME: Superset scope matching on lookup, race-free create-if-absent on consent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use super::models::Authorization;
use crate::storage::StorageProvider;
use std::sync::Arc;
use uuid::Uuid;

/// Store of granted permanent authorizations
///
/// A stored grant matches a request when its scope set is a superset of (or
/// equal to) the requested scopes. Grants are only created, never mutated;
/// revocation happens elsewhere.
pub struct AuthorizationStore {
    storage: Arc<dyn StorageProvider>,
}

impl AuthorizationStore {
    /// Creates a new authorization store over the given storage
    #[must_use]
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    /// Find valid permanent authorizations for (subject, client) whose scope
    /// set covers the requested scopes
    ///
    /// # Errors
    /// Returns an error on storage failure
    pub async fn find_covering(
        &self,
        subject: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> anyhow::Result<Vec<Authorization>> {
        let authorizations = self.storage.list_authorizations(subject, client_id).await?;
        Ok(authorizations
            .into_iter()
            .filter(|a| a.covers(scopes))
            .collect())
    }

    /// Ensure a permanent authorization covering the given scopes exists,
    /// creating one when absent. The storage layer runs the find-then-create
    /// inside one transaction, so concurrent consent submissions for the same
    /// (subject, client, scopes) converge on a single grant.
    ///
    /// # Errors
    /// Returns an error on storage failure
    pub async fn ensure_permanent(
        &self,
        subject: Uuid,
        client_id: &str,
        scopes: &[String],
    ) -> anyhow::Result<Authorization> {
        self.storage
            .create_authorization_if_absent(subject, client_id, scopes)
            .await
    }
}
