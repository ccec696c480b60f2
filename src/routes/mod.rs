// ABOUTME: HTTP route modules for the identity server
// ABOUTME: Connect endpoints, consent form retrieval, and OIDC discovery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

/// `/connect/*` protocol endpoints
pub mod connect;
/// Consent form retrieval for the consent-collection UI
pub mod consent;
/// OIDC discovery document
pub mod discovery;
