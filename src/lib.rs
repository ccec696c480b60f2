// ABOUTME: Main library entry point for the Ecommershop identity platform
// ABOUTME: Hosts the OAuth2/OIDC authorization server consumed by the storefront microservices
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

#![deny(unsafe_code)]

//! # Ecommershop Identity Server
//!
//! An OAuth2/OpenID-Connect authorization server for the ecommershop
//! microservices. It issues authorization codes, access/identity/refresh
//! tokens and userinfo responses to the storefront, mobile and Swagger
//! clients, with consent tracking and claim projection driven by the
//! registered scopes.
//!
//! ## Architecture
//!
//! - **oidc**: the protocol core — authorization state machine, token
//!   exchange, claims projection, client/scope/authorization registries
//! - **storage**: persistence abstraction with a SQLite backend
//! - **auth**: session-cookie authentication for the authorization endpoint
//! - **routes**: axum HTTP handlers for the `/connect/*` endpoints
//! - **config**: environment-based configuration management
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ecommershop_identity::config::environment::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Identity server configured for port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Session-cookie authentication and principal resolution
pub mod auth;

/// Configuration management and environment parsing
pub mod config;

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Logging configuration and structured logging setup
pub mod logging;

/// Domain models shared across modules
pub mod models;

/// OAuth2/OIDC protocol core: authorization, consent, token exchange, claims
pub mod oidc;

/// Centralized resource container for dependency injection
pub mod resources;

/// HTTP routes for the `/connect/*` and discovery endpoints
pub mod routes;

/// Seed data provisioning for scopes, clients, roles and the admin user
pub mod seed;

/// HTTP server assembly and lifecycle
pub mod server;

/// Storage abstraction layer with SQLite backend
pub mod storage;

/// Shared test fixtures
pub mod test_utils;
