// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit API client for token management and activity logging.
//!
//! Handles:
//! - Authorization code exchange
//! - Token refresh (Basic-authenticated with the app credentials)
//! - Access token liveness probe
//! - Activity log submission

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{NaiveDate, Utc};
use reqwest::{header::AUTHORIZATION, StatusCode};
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::{AppError, Result};

/// Fitbit API client.
#[derive(Clone)]
pub struct FitbitClient {
    http: reqwest::Client,
    api: ApiConfig,
    client_id: String,
    client_secret: String,
}

impl FitbitClient {
    /// Create a new Fitbit client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String, api: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(api.request_timeout)
            .build()
            .map_err(|e| AppError::FitbitApi(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api,
            client_id,
            client_secret,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.api.token_url)
            .header(AUTHORIZATION, self.basic_auth())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::FitbitApi(format!("Token exchange request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Fitbit token exchange failed");
            return Err(AppError::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        parse_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.api.token_url)
            .header(AUTHORIZATION, self.basic_auth())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::FitbitApi(format!("Token refresh request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Fitbit token refresh failed");
            return Err(AppError::Refresh {
                status: status.as_u16(),
                body,
            });
        }

        parse_json(response).await
    }

    /// Lightweight authenticated call used to test the access token.
    ///
    /// Returns the raw status; only the caller decides what it means.
    pub async fn probe(&self, access_token: &str, date: NaiveDate) -> Result<StatusCode> {
        let url = format!(
            "{}/activities/date/{}.json",
            self.api.api_base,
            date.format("%Y-%m-%d")
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::FitbitApi(format!("Probe request failed: {}", e)))?;

        Ok(response.status())
    }

    /// Submit one activity log entry.
    pub async fn log_activity(
        &self,
        access_token: &str,
        entry: &ActivityLogEntry,
    ) -> Result<Submission> {
        let url = format!("{}/activities.json", self.api.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .form(&entry.to_form())
            .send()
            .await
            .map_err(|e| AppError::FitbitApi(format!("Log request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        Ok(match status.as_u16() {
            200 | 201 => Submission::Accepted {
                log_id: extract_log_id(&body),
            },
            401 => Submission::Unauthorized { body },
            code => Submission::Rejected { status: code, body },
        })
    }

    fn basic_auth(&self) -> String {
        basic_auth_header(&self.client_id, &self.client_secret)
    }
}

/// `Basic base64(client_id:client_secret)` header value for the token endpoint.
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        BASE64.encode(format!("{}:{}", client_id, client_secret))
    )
}

/// Parse a success body as JSON.
async fn parse_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| AppError::FitbitApi(format!("Failed to parse token response: {}", e)))
}

/// Pull `activityLog.logId` out of a submission response body.
fn extract_log_id(body: &str) -> Option<String> {
    let json: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Activity log response is not JSON");
            return None;
        }
    };

    match json.get("activityLog")?.get("logId")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Outcome of one activity log submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// 200 or 201
    Accepted { log_id: Option<String> },
    /// 401, the access token is no longer valid
    Unauthorized { body: String },
    Rejected { status: u16, body: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// FitbitService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::TokenStore;
use crate::models::{ActivityLogEntry, CredentialRecord};
use crate::time_utils::utc_today;

/// Result of the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    /// Probe did not answer 401; token presumed valid
    Valid,
    /// Probe answered 401 and the token was refreshed
    Refreshed,
}

/// A successfully logged activity.
#[derive(Debug, Clone, PartialEq)]
pub struct LogOutcome {
    pub steps: u32,
    pub date: NaiveDate,
    pub log_id: Option<String>,
}

/// High-level Fitbit service that manages the token lifecycle.
///
/// Owns the in-memory copy of the credential record and writes it back to the
/// [`TokenStore`] whenever a refresh succeeds.
pub struct FitbitService {
    client: FitbitClient,
    store: TokenStore,
    credentials: CredentialRecord,
}

impl FitbitService {
    pub fn new(client: FitbitClient, store: TokenStore, credentials: CredentialRecord) -> Self {
        Self {
            client,
            store,
            credentials,
        }
    }

    pub fn credentials(&self) -> &CredentialRecord {
        &self.credentials
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Probe the access token for today's date and refresh it on 401.
    ///
    /// Any other probe status counts as valid; this never retries.
    pub async fn refresh_if_needed(&mut self) -> Result<TokenCheck> {
        let today = utc_today();
        let status = self
            .client
            .probe(&self.credentials.access_token, today)
            .await?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::info!("Access token rejected by probe, refreshing");
            self.refresh_access_token().await?;
            return Ok(TokenCheck::Refreshed);
        }

        tracing::debug!(status = %status, "Access token presumed valid");
        Ok(TokenCheck::Valid)
    }

    /// Refresh the access token and persist the updated record.
    pub async fn refresh_access_token(&mut self) -> Result<()> {
        let refresh_token = self
            .credentials
            .refresh_token
            .as_deref()
            .ok_or(AppError::MissingRefreshToken)?;

        let tokens = self.client.refresh_token(refresh_token).await?;

        let mut updated = self.credentials.clone();
        updated.apply_refresh(tokens, Utc::now());
        self.store.save(&updated).await?;
        self.credentials = updated;

        tracing::info!("Token refreshed and saved");
        Ok(())
    }

    // ─── Activity Logging ────────────────────────────────────────────────────

    /// Submit `entry`, refreshing and resubmitting once if the token was
    /// rejected with 401.
    pub async fn log_steps(&mut self, entry: &ActivityLogEntry) -> Result<LogOutcome> {
        let mut submission = self
            .client
            .log_activity(&self.credentials.access_token, entry)
            .await?;

        if matches!(submission, Submission::Unauthorized { .. }) {
            tracing::info!("Token expired, refreshing");
            self.refresh_access_token().await?;
            submission = self
                .client
                .log_activity(&self.credentials.access_token, entry)
                .await?;
        }

        match submission {
            Submission::Accepted { log_id } => {
                tracing::info!(
                    steps = entry.steps,
                    date = %entry.date,
                    log_id = log_id.as_deref().unwrap_or("-"),
                    "Activity logged"
                );
                Ok(LogOutcome {
                    steps: entry.steps,
                    date: entry.date,
                    log_id,
                })
            }
            Submission::Unauthorized { body } => {
                tracing::warn!("Activity log rejected again after refresh");
                Err(AppError::Submission {
                    status: StatusCode::UNAUTHORIZED.as_u16(),
                    body,
                })
            }
            Submission::Rejected { status, body } => {
                tracing::warn!(status, body = %body, "Activity log rejected");
                Err(AppError::Submission { status, body })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_header() {
        // base64("client:secret")
        assert_eq!(
            basic_auth_header("client", "secret"),
            "Basic Y2xpZW50OnNlY3JldA=="
        );
    }

    #[test]
    fn test_extract_log_id() {
        assert_eq!(
            extract_log_id(r#"{"activityLog":{"logId":123}}"#).as_deref(),
            Some("123")
        );
        assert_eq!(
            extract_log_id(r#"{"activityLog":{"logId":"abc"}}"#).as_deref(),
            Some("abc")
        );
        assert_eq!(extract_log_id(r#"{"activityLog":{}}"#), None);
        assert_eq!(extract_log_id(r#"{"other":1}"#), None);
        assert_eq!(extract_log_id("<html>ok</html>"), None);
    }

    #[test]
    fn test_token_response_minimal() {
        let tokens: TokenResponse = serde_json::from_str(r#"{"access_token":"A2"}"#).unwrap();
        assert_eq!(tokens.access_token, "A2");
        assert!(tokens.refresh_token.is_none());
    }
}
