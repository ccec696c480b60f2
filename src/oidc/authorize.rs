// ABOUTME: Authorization endpoint state machine with consent handling
// ABOUTME: Authentication check, prompt handling, grant lookup, consent branching, code issuance
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

use super::authorizations::AuthorizationStore;
use super::clients::ClientRegistry;
use super::models::{
    AuthCodeRecord, AuthorizeRequest, Client, ConsentForm, ConsentType, ConsentView, OAuth2Error,
};
use super::scopes::ScopeRegistry;
use super::tokens::TokenIssuer;
use crate::models::User;
use crate::storage::StorageProvider;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Where an authorization request ends up after evaluation
#[derive(Debug)]
pub enum AuthorizeOutcome {
    /// No authenticated session: send the user agent to the login
    /// collaborator, preserving the original request as the return target
    ChallengeLogin,
    /// Consent is required: hand the view to the consent-collection UI.
    /// The flow pauses here; a separate consent submission resumes it.
    ShowConsent(ConsentView),
    /// Authorization code issued: redirect back to the client
    IssueCode {
        /// Validated redirect URI
        redirect_uri: String,
        /// Single-use authorization code
        code: String,
        /// State echoed back to the client
        state: Option<String>,
    },
}

/// Protocol error plus whether it may be delivered via client redirect.
///
/// Errors raised before the redirect URI is validated must never be
/// redirected; everything after may be.
#[derive(Debug)]
pub struct AuthorizeError {
    /// The OAuth error to report
    pub error: OAuth2Error,
    /// Redirect target when the error may travel back to the client
    pub redirect: Option<ErrorRedirect>,
}

/// Validated redirect target for error delivery
#[derive(Debug)]
pub struct ErrorRedirect {
    /// Registered redirect URI from the request
    pub redirect_uri: String,
    /// State echoed back to the client
    pub state: Option<String>,
}

impl AuthorizeError {
    fn inline(error: OAuth2Error) -> Self {
        Self {
            error,
            redirect: None,
        }
    }

    fn redirectable(error: OAuth2Error, request: &AuthorizeRequest) -> Self {
        Self {
            error,
            redirect: Some(ErrorRedirect {
                redirect_uri: request.redirect_uri.clone(),
                state: request.state.clone(),
            }),
        }
    }
}

/// The `/connect/authorize` state machine
pub struct AuthorizationFlow {
    storage: Arc<dyn StorageProvider>,
    clients: ClientRegistry,
    scopes: ScopeRegistry,
    authorizations: AuthorizationStore,
    issuer: Arc<TokenIssuer>,
}

impl AuthorizationFlow {
    /// Assemble the flow over its collaborators.
    ///
    /// Issued codes bind the principal by subject and scope set; claims are
    /// re-derived fresh at exchange time rather than cached from issuance.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageProvider>, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            clients: ClientRegistry::new(storage.clone()),
            scopes: ScopeRegistry::new(storage.clone()),
            authorizations: AuthorizationStore::new(storage.clone()),
            storage,
            issuer,
        }
    }

    /// Evaluate an authorization request for the given (possibly absent)
    /// authenticated principal.
    ///
    /// # Errors
    /// Returns the OAuth error terminating the flow, marked redirectable when
    /// the redirect URI had already been validated
    pub async fn authorize(
        &self,
        request: &AuthorizeRequest,
        principal: Option<Uuid>,
    ) -> Result<AuthorizeOutcome, AuthorizeError> {
        let client = self.validate_request(request).await?;

        // Authentication check comes after request validation so errors can
        // travel back to a verified client redirect URI
        let Some(user_id) = principal else {
            if request.has_prompt("none") {
                return Err(AuthorizeError::redirectable(
                    OAuth2Error::login_required("The user is not logged in."),
                    request,
                ));
            }
            tracing::info!(
                client_id = %request.client_id,
                "No authenticated session for authorization request, challenging login"
            );
            return Ok(AuthorizeOutcome::ChallengeLogin);
        };

        let user = self.resolve_user(user_id, request).await?;
        let requested_scopes = request.scopes();

        let existing = self
            .authorizations
            .find_covering(user.id, &client.client_id, &requested_scopes)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Authorization lookup failed");
                AuthorizeError::redirectable(OAuth2Error::server_error(), request)
            })?;

        match client.consent_type {
            // Admin-granted-only clients cannot self-serve consent
            ConsentType::External if existing.is_empty() => Err(AuthorizeError::redirectable(
                OAuth2Error::consent_required(
                    "The logged in user is not allowed to access this client application.",
                ),
                request,
            )),

            // Auto-grant: no consent UI when the client is implicit, or a
            // covering grant exists and the request does not force consent
            ConsentType::Implicit | ConsentType::External => {
                self.issue_code(&user, &client, request).await
            }
            ConsentType::Explicit if !existing.is_empty() && !request.has_prompt("consent") => {
                self.issue_code(&user, &client, request).await
            }

            ConsentType::Explicit | ConsentType::Systematic if request.has_prompt("none") => {
                Err(AuthorizeError::redirectable(
                    OAuth2Error::consent_required("Interactive user consent is required."),
                    request,
                ))
            }

            ConsentType::Explicit | ConsentType::Systematic => {
                let view = self.build_consent_view(&client, &requested_scopes).await?;
                Ok(AuthorizeOutcome::ShowConsent(view))
            }
        }
    }

    /// Process a consent submission.
    ///
    /// Every forwarded parameter is re-validated against the registries —
    /// the consent round-trip carries no trusted server-side state.
    ///
    /// # Errors
    /// Returns `access_denied` when the user denied, or any validation error
    pub async fn consent(
        &self,
        form: &ConsentForm,
        principal: Uuid,
    ) -> Result<AuthorizeOutcome, AuthorizeError> {
        let request = form.to_authorize_request();
        let client = self.validate_request(&request).await?;
        let user = self.resolve_user(principal, &request).await?;

        if form.action == "deny" {
            tracing::info!(
                user_id = %user.id,
                client_id = %client.client_id,
                "User denied consent"
            );
            return Err(AuthorizeError::redirectable(
                OAuth2Error::access_denied("The authorization was denied by the user"),
                &request,
            ));
        }

        if form.action != "allow" {
            return Err(AuthorizeError::redirectable(
                OAuth2Error::invalid_request("Unknown consent action"),
                &request,
            ));
        }

        let requested_scopes = request.scopes();

        if form.remember_consent {
            self.authorizations
                .ensure_permanent(user.id, &client.client_id, &requested_scopes)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to store permanent authorization");
                    AuthorizeError::redirectable(OAuth2Error::server_error(), &request)
                })?;
        }

        self.issue_code(&user, &client, &request).await
    }

    /// Build the consent view for a pending request reconstructed by the
    /// consent-collection UI. Re-validates the request in full.
    ///
    /// # Errors
    /// Returns any request validation error
    pub async fn consent_view(
        &self,
        request: &AuthorizeRequest,
    ) -> Result<ConsentView, AuthorizeError> {
        let client = self.validate_request(request).await?;
        self.build_consent_view(&client, &request.scopes()).await
    }

    /// Validate response type, client, redirect URI, scopes and PKCE.
    /// Returns the resolved client.
    async fn validate_request(
        &self,
        request: &AuthorizeRequest,
    ) -> Result<Client, AuthorizeError> {
        if request.response_type != "code" {
            return Err(AuthorizeError::inline(OAuth2Error::invalid_request(
                "Only 'code' response_type is supported",
            )));
        }

        let client = self
            .clients
            .get_client(&request.client_id)
            .await
            .map_err(AuthorizeError::inline)?;

        if !ClientRegistry::redirect_uri_registered(&client, &request.redirect_uri) {
            return Err(AuthorizeError::inline(OAuth2Error::invalid_request(
                "Invalid redirect_uri",
            )));
        }

        let requested_scopes = request.scopes();
        if !client.allows_scopes(&requested_scopes) {
            return Err(AuthorizeError::redirectable(
                OAuth2Error::invalid_scope("The client is not allowed to request these scopes"),
                request,
            ));
        }

        Self::validate_pkce(&client, request)?;

        Ok(client)
    }

    /// PKCE request validation (RFC 7636): mandatory for clients provisioned
    /// with the requirement, S256 only
    fn validate_pkce(client: &Client, request: &AuthorizeRequest) -> Result<(), AuthorizeError> {
        match &request.code_challenge {
            Some(code_challenge) => {
                if code_challenge.len() < 43 || code_challenge.len() > 128 {
                    return Err(AuthorizeError::redirectable(
                        OAuth2Error::invalid_request(
                            "code_challenge must be between 43 and 128 characters",
                        ),
                        request,
                    ));
                }

                let method = request.code_challenge_method.as_deref().unwrap_or("S256");
                if method != "S256" {
                    return Err(AuthorizeError::redirectable(
                        OAuth2Error::invalid_request(
                            "code_challenge_method must be 'S256' (plain is not supported)",
                        ),
                        request,
                    ));
                }
                Ok(())
            }
            None if client.requires_pkce => Err(AuthorizeError::redirectable(
                OAuth2Error::invalid_request(
                    "code_challenge is required for this client (PKCE)",
                ),
                request,
            )),
            None => Ok(()),
        }
    }

    /// Resolve the user record behind an authenticated principal. Failure
    /// here means the session and the user store have desynced.
    async fn resolve_user(
        &self,
        user_id: Uuid,
        request: &AuthorizeRequest,
    ) -> Result<User, AuthorizeError> {
        match self.storage.get_user(user_id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                tracing::error!(
                    user_id = %user_id,
                    "Authenticated principal has no user record"
                );
                Err(AuthorizeError::redirectable(
                    OAuth2Error::server_error(),
                    request,
                ))
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "User lookup failed");
                Err(AuthorizeError::redirectable(
                    OAuth2Error::server_error(),
                    request,
                ))
            }
        }
    }

    async fn build_consent_view(
        &self,
        client: &Client,
        requested_scopes: &[String],
    ) -> Result<ConsentView, AuthorizeError> {
        let scope_descriptions =
            self.scopes
                .describe(requested_scopes)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Scope description lookup failed");
                    AuthorizeError::inline(OAuth2Error::server_error())
                })?;

        Ok(ConsentView {
            application_name: client.display_name.clone(),
            scope: requested_scopes.join(" "),
            scopes: requested_scopes.to_vec(),
            scope_descriptions,
        })
    }

    /// Issue an authorization code bound to (subject, client, scopes) and the
    /// permanent authorization, creating the grant when absent so future
    /// requests with the same scopes skip consent
    async fn issue_code(
        &self,
        user: &User,
        client: &Client,
        request: &AuthorizeRequest,
    ) -> Result<AuthorizeOutcome, AuthorizeError> {
        let requested_scopes = request.scopes();

        let authorization = self
            .authorizations
            .ensure_permanent(user.id, &client.client_id, &requested_scopes)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to ensure permanent authorization");
                AuthorizeError::redirectable(OAuth2Error::server_error(), request)
            })?;

        let now = Utc::now();
        let code = self.issuer.generate_code().map_err(|e| {
            tracing::error!(error = %e, "Failed to generate authorization code");
            AuthorizeError::redirectable(OAuth2Error::server_error(), request)
        })?;

        let record = AuthCodeRecord {
            code: code.clone(),
            client_id: client.client_id.clone(),
            subject: user.id,
            authorization_id: authorization.id,
            redirect_uri: request.redirect_uri.clone(),
            scopes: requested_scopes,
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
            expires_at: self.issuer.code_expiry(now),
            used: false,
            created_at: now,
        };

        self.storage.store_auth_code(&record).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to store authorization code");
            AuthorizeError::redirectable(OAuth2Error::server_error(), request)
        })?;

        tracing::info!(
            user_id = %user.id,
            client_id = %client.client_id,
            "Issued authorization code"
        );

        Ok(AuthorizeOutcome::IssueCode {
            redirect_uri: request.redirect_uri.clone(),
            code,
            state: request.state.clone(),
        })
    }
}
