//! Persisted OAuth credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::services::fitbit::TokenResponse;
use crate::time_utils::format_utc_rfc3339;

/// Credential record stored in `fitbit_tokens.json`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Bearer token for API calls
    pub access_token: String,
    /// Long-lived token used to mint new access tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted OAuth scopes (space separated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Access token lifetime in seconds, as reported at issue time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// When this record was last written (RFC 3339, UTC)
    pub updated_at: String,
}

impl CredentialRecord {
    /// Build a record from an authorization-code exchange.
    pub fn from_token_response(tokens: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            scope: tokens.scope,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            updated_at: format_utc_rfc3339(now),
        }
    }

    /// Apply a refresh response.
    ///
    /// The access token and timestamp are always replaced; every other field
    /// is only replaced when the server sent a value for it.
    pub fn apply_refresh(&mut self, tokens: TokenResponse, now: DateTime<Utc>) {
        self.access_token = tokens.access_token;
        if let Some(refresh_token) = tokens.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = tokens.scope {
            self.scope = Some(scope);
        }
        if let Some(token_type) = tokens.token_type {
            self.token_type = Some(token_type);
        }
        if let Some(expires_in) = tokens.expires_in {
            self.expires_in = Some(expires_in);
        }
        self.updated_at = format_utc_rfc3339(now);
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
