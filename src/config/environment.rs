// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, deployment modes, and runtime configuration parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ecommershop

//! Environment-based configuration management for production deployment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

/// Strongly typed log level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Environment type for security and other configurations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Log level for the tracing subscriber
    pub log_level: LogLevel,
    /// Deployment environment
    pub environment: Environment,
    /// Database settings
    pub database: DatabaseConfig,
    /// Session cookie settings for the authorization endpoint
    pub session: SessionConfig,
    /// OAuth2/OIDC server settings
    pub oidc: OidcServerConfig,
    /// Allowed CORS origins ("*" for any)
    pub cors_origins: Vec<String>,
}

/// Database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLx connection URL (e.g. `sqlite:./data/identity.db`)
    pub url: String,
    /// Run schema migration automatically at startup
    pub auto_migrate: bool,
}

/// Session cookie settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Secret used to sign session JWTs
    pub secret: String,
    /// Cookie name carrying the session token
    pub cookie_name: String,
    /// Session lifetime in hours
    pub expiry_hours: i64,
    /// External login page the authorization endpoint redirects to
    /// when no authenticated session is present
    pub login_url: String,
}

/// OAuth2/OIDC server settings
#[derive(Debug, Clone)]
pub struct OidcServerConfig {
    /// Issuer URL embedded in tokens and the discovery document
    pub issuer_url: String,
    /// Secret used to sign access and identity tokens
    pub signing_secret: String,
    /// Access token lifetime in seconds
    pub access_token_ttl_secs: i64,
    /// Identity token lifetime in seconds
    pub identity_token_ttl_secs: i64,
    /// Refresh token lifetime in days
    pub refresh_token_ttl_days: i64,
    /// Authorization code lifetime in seconds
    pub auth_code_ttl_secs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is present but cannot be parsed, or if
    /// a required secret is missing in a production environment.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let environment =
            Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development")?);

        let session_secret = secret_var("SESSION_SECRET", &environment)?;
        let signing_secret = secret_var("TOKEN_SIGNING_SECRET", &environment)?;

        let http_port: u16 = env_var_or("HTTP_PORT", "8084")?
            .parse()
            .context("Invalid HTTP_PORT value")?;

        let config = Self {
            http_port,
            log_level: LogLevel::from_str_or_default(&env_var_or("LOG_LEVEL", "info")?),
            environment,
            database: DatabaseConfig {
                url: env_var_or("DATABASE_URL", "sqlite:./data/identity.db")?,
                auto_migrate: env_var_or("AUTO_MIGRATE", "true")?
                    .parse()
                    .context("Invalid AUTO_MIGRATE value")?,
            },
            session: SessionConfig {
                secret: session_secret,
                cookie_name: env_var_or("SESSION_COOKIE_NAME", "identity_session")?,
                expiry_hours: env_var_or("SESSION_EXPIRY_HOURS", "24")?
                    .parse()
                    .context("Invalid SESSION_EXPIRY_HOURS value")?,
                login_url: env_var_or("LOGIN_URL", "/account/login")?,
            },
            oidc: OidcServerConfig {
                issuer_url: env_var_or(
                    "ISSUER_URL",
                    &format!("http://localhost:{http_port}"),
                )?,
                signing_secret,
                access_token_ttl_secs: env_var_or("ACCESS_TOKEN_TTL_SECS", "3600")?
                    .parse()
                    .context("Invalid ACCESS_TOKEN_TTL_SECS value")?,
                identity_token_ttl_secs: env_var_or("IDENTITY_TOKEN_TTL_SECS", "1200")?
                    .parse()
                    .context("Invalid IDENTITY_TOKEN_TTL_SECS value")?,
                refresh_token_ttl_days: env_var_or("REFRESH_TOKEN_TTL_DAYS", "14")?
                    .parse()
                    .context("Invalid REFRESH_TOKEN_TTL_DAYS value")?,
                auth_code_ttl_secs: env_var_or("AUTH_CODE_TTL_SECS", "600")?
                    .parse()
                    .context("Invalid AUTH_CODE_TTL_SECS value")?,
            },
            cors_origins: parse_origins(&env_var_or("CORS_ORIGINS", "*")?),
        };

        Ok(config)
    }

    /// One-line configuration summary for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "http_port={} environment={:?} database={} issuer={} login_url={}",
            self.http_port,
            self.environment,
            self.database.url,
            self.oidc.issuer_url,
            self.session.login_url
        )
    }
}

/// Read an environment variable with a default fallback
fn env_var_or(name: &str, default: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Ok(default.to_owned()),
    }
}

/// Read a secret variable; required in production, generated default otherwise
fn secret_var(name: &str, environment: &Environment) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ if environment.is_production() => {
            anyhow::bail!("{name} must be set in a production environment")
        }
        // Development fallback keeps local startup friction-free; tokens
        // signed with it are worthless outside the current process tree.
        _ => Ok(format!("dev-only-{}-secret", name.to_lowercase())),
    }
}

/// Parse comma-separated CORS origins
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str_or_default("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_or_default("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_or_default("bogus"), LogLevel::Info);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::from_str_or_default("prod"),
            Environment::Production
        );
        assert_eq!(
            Environment::from_str_or_default("test"),
            Environment::Testing
        );
        assert!(!Environment::from_str_or_default("dev").is_production());
    }

    #[test]
    fn test_parse_origins() {
        let origins = parse_origins("https://a.example, https://b.example");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "https://a.example");
    }
}
