// ABOUTME: Scope registry with resource resolution and consent descriptions
// ABOUTME: Resolves registered scopes and falls back to a static description table
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use super::models::ScopeDescription;
use crate::storage::StorageProvider;
use std::sync::Arc;

/// Read-mostly registry of registered scopes
pub struct ScopeRegistry {
    storage: Arc<dyn StorageProvider>,
}

impl ScopeRegistry {
    /// Creates a new scope registry over the given storage
    #[must_use]
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    /// Resolve the audience (resource server) identifiers declared by the
    /// given scopes, deduplicated in first-seen order.
    ///
    /// # Errors
    /// Returns an error on storage failure
    pub async fn resources_for(&self, scopes: &[String]) -> anyhow::Result<Vec<String>> {
        let mut resources = Vec::new();
        for name in scopes {
            if let Some(scope) = self.storage.get_scope(name).await? {
                for resource in scope.resources {
                    if !resources.contains(&resource) {
                        resources.push(resource);
                    }
                }
            }
        }
        Ok(resources)
    }

    /// Build consent-form descriptions for the requested scopes.
    ///
    /// Registered scopes use their stored display name and description;
    /// anything missing falls back to the static table.
    ///
    /// # Errors
    /// Returns an error on storage failure
    pub async fn describe(&self, scopes: &[String]) -> anyhow::Result<Vec<ScopeDescription>> {
        let mut descriptions = Vec::with_capacity(scopes.len());
        for name in scopes {
            let description = match self.storage.get_scope(name).await? {
                Some(scope) => ScopeDescription {
                    name: scope.name,
                    display_name: if scope.display_name.is_empty() {
                        name.clone()
                    } else {
                        scope.display_name
                    },
                    description: if scope.description.is_empty() {
                        default_scope_description(name)
                    } else {
                        scope.description
                    },
                },
                None => ScopeDescription {
                    name: name.clone(),
                    display_name: name.clone(),
                    description: default_scope_description(name),
                },
            };
            descriptions.push(description);
        }
        Ok(descriptions)
    }
}

/// Static fallback descriptions for well-known scopes
#[must_use]
pub fn default_scope_description(scope_name: &str) -> String {
    match scope_name {
        "openid" => "Access to your unique identifier".to_owned(),
        "profile" => "Access to your profile information (name, etc.)".to_owned(),
        "email" => "Access to your email address".to_owned(),
        "catalog" => "Access to catalog information".to_owned(),
        "roles" => "Access to your role information".to_owned(),
        other => format!("Access to {other} resources"),
    }
}
