// ABOUTME: Client registry for registered OAuth client applications
// ABOUTME: Lookup by client_id, argon2 secret verification, redirect URI validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use super::models::{Client, ClientType, OAuth2Error};
use crate::storage::StorageProvider;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::Arc;

/// Read-mostly registry of provisioned client applications
pub struct ClientRegistry {
    storage: Arc<dyn StorageProvider>,
}

impl ClientRegistry {
    /// Creates a new client registry over the given storage
    #[must_use]
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    /// Find a client by `client_id`; returns `None` when unknown.
    ///
    /// Callers must treat an unknown client as a fatal, request-aborting
    /// condition — never fall back to a default client.
    ///
    /// # Errors
    /// Returns an error only on storage failure
    pub async fn find_by_client_id(&self, client_id: &str) -> anyhow::Result<Option<Client>> {
        self.storage.get_client(client_id).await
    }

    /// Resolve a client or fail with `invalid_client`
    ///
    /// # Errors
    /// Returns `invalid_client` when the client is unknown or storage fails
    pub async fn get_client(&self, client_id: &str) -> Result<Client, OAuth2Error> {
        match self.storage.get_client(client_id).await {
            Ok(Some(client)) => Ok(client),
            Ok(None) => {
                tracing::warn!(client_id = %client_id, "Unknown OAuth client");
                Err(OAuth2Error::invalid_client())
            }
            Err(e) => {
                tracing::error!(client_id = %client_id, error = %e, "Client lookup failed");
                Err(OAuth2Error::server_error())
            }
        }
    }

    /// Authenticate a client on the token endpoint.
    ///
    /// Confidential clients must present their secret; the protocol error
    /// never reveals whether the client was unknown or the secret wrong.
    /// Public clients carry no secret and rely on PKCE.
    ///
    /// # Errors
    /// Returns `invalid_client` when authentication fails
    pub fn authenticate(client: &Client, client_secret: Option<&str>) -> Result<(), OAuth2Error> {
        match client.client_type {
            ClientType::Public => Ok(()),
            ClientType::Confidential => {
                let secret = client_secret.filter(|s| !s.is_empty()).ok_or_else(|| {
                    tracing::warn!(
                        client_id = %client.client_id,
                        "Confidential client omitted its secret"
                    );
                    OAuth2Error::invalid_client()
                })?;

                let stored_hash = client.client_secret_hash.as_deref().ok_or_else(|| {
                    tracing::error!(
                        client_id = %client.client_id,
                        "Confidential client has no stored secret hash"
                    );
                    OAuth2Error::invalid_client()
                })?;

                Self::verify_client_secret(&client.client_id, secret, stored_hash)
            }
        }
    }

    /// Verify a client secret against its stored Argon2 hash
    fn verify_client_secret(
        client_id: &str,
        client_secret: &str,
        client_secret_hash: &str,
    ) -> Result<(), OAuth2Error> {
        let parsed_hash = PasswordHash::new(client_secret_hash).map_err(|e| {
            tracing::error!("Failed to parse stored client secret hash: {}", e);
            OAuth2Error::invalid_client()
        })?;

        let argon2 = Argon2::default();
        if argon2
            .verify_password(client_secret.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!("OAuth client {} secret validation failed", client_id);
            return Err(OAuth2Error::invalid_client());
        }

        Ok(())
    }

    /// Hash a client secret for storage using Argon2id
    ///
    /// # Errors
    /// Returns an error if Argon2 password hashing fails
    pub fn hash_client_secret(secret: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let hash = argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Argon2 password hashing failed: {e}"))?;

        Ok(hash.to_string())
    }

    /// Whether the redirect URI is registered for the client
    #[must_use]
    pub fn redirect_uri_registered(client: &Client, redirect_uri: &str) -> bool {
        client.redirect_uris.iter().any(|u| u == redirect_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oidc::models::ConsentType;
    use chrono::Utc;

    fn confidential_client(secret_hash: Option<String>) -> Client {
        Client {
            id: "internal-1".to_owned(),
            client_id: "web-client".to_owned(),
            client_secret_hash: secret_hash,
            client_type: ClientType::Confidential,
            display_name: "Web Application".to_owned(),
            redirect_uris: vec!["https://localhost:7001/signin-oidc".to_owned()],
            post_logout_redirect_uris: vec![],
            consent_type: ConsentType::Explicit,
            allowed_scopes: vec!["profile".to_owned()],
            allowed_grant_types: vec!["authorization_code".to_owned()],
            requires_pkce: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_authenticate_verifies_secret() {
        let hash = ClientRegistry::hash_client_secret("web-client-secret").unwrap();
        let client = confidential_client(Some(hash));

        assert!(ClientRegistry::authenticate(&client, Some("web-client-secret")).is_ok());

        let err = ClientRegistry::authenticate(&client, Some("wrong")).unwrap_err();
        assert_eq!(err.error, "invalid_client");

        let err = ClientRegistry::authenticate(&client, None).unwrap_err();
        assert_eq!(err.error, "invalid_client");
    }

    #[test]
    fn test_public_client_needs_no_secret() {
        let mut client = confidential_client(None);
        client.client_type = ClientType::Public;

        assert!(ClientRegistry::authenticate(&client, None).is_ok());
    }

    #[test]
    fn test_redirect_uri_registration() {
        let client = confidential_client(None);
        assert!(ClientRegistry::redirect_uri_registered(
            &client,
            "https://localhost:7001/signin-oidc"
        ));
        assert!(!ClientRegistry::redirect_uri_registered(
            &client,
            "https://evil.example/callback"
        ));
    }
}
