// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.

use crate::config::ConfigError;

/// Application error type shared by the Authorizer and the Runner.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No authorization code received: {0}")]
    NoAuthorizationCode(String),

    #[error("Callback server error: {0}")]
    CallbackServer(String),

    #[error("Token exchange failed: HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("Refresh failed: HTTP {status}: {body}")]
    Refresh { status: u16, body: String },

    #[error("No refresh token stored, run login again")]
    MissingRefreshToken,

    #[error("Log failed: HTTP {status}: {body}")]
    Submission { status: u16, body: String },

    #[error("Fitbit API error: {0}")]
    FitbitApi(String),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the failure happened while obtaining or refreshing tokens.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            AppError::TokenExchange { .. } | AppError::Refresh { .. } | AppError::MissingRefreshToken
        )
    }

    /// Whether the error stems from a missing config or credential file.
    pub fn is_config_missing(&self) -> bool {
        matches!(self, AppError::Config(ConfigError::Missing { .. }))
    }
}

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, AppError>;
