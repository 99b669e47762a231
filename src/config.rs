//! Application configuration loaded from the JSON config file and environment.
//!
//! The config file holds the Fitbit app identity plus the Runner's defaults.
//! Remote endpoints default to the public Fitbit API and can be pointed
//! elsewhere through environment variables.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::time_utils::parse_time_of_day;

/// Default location of the app/config record.
pub const CONFIG_FILE: &str = "fitbit_config.json";
/// Default location of the credential record.
pub const TOKEN_FILE: &str = "fitbit_tokens.json";

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/";
pub const DEFAULT_SCOPE: &str = "activity";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DAILY_STEPS: u32 = 10_000;
pub const DEFAULT_START_TIME: &str = "08:00";

/// App identity and Runner defaults, as stored in `fitbit_config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fitbit OAuth client ID
    pub client_id: String,
    /// Fitbit OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with the Fitbit app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Requested OAuth scope (space separated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Callback listener port when the redirect URI has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_port: Option<u16>,
    /// Steps logged per run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_steps: Option<u32>,
    /// Activity start time of day (`HH:MM`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

impl AppConfig {
    /// Load the config record from `path`.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing {
                    path: path.to_path_buf(),
                    hint: "Provide client_id and client_secret.",
                });
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config: Self = serde_json::from_slice(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Placeholder record written for first-time setup.
    pub fn sample() -> Self {
        Self {
            client_id: "YOUR_CLIENT_ID".to_string(),
            client_secret: "YOUR_CLIENT_SECRET".to_string(),
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            scope: Some(DEFAULT_SCOPE.to_string()),
            default_port: Some(DEFAULT_PORT),
            daily_steps: None,
            start_time: None,
        }
    }

    /// Write [`AppConfig::sample`] to `path`.
    pub async fn write_sample(path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(&Self::sample())?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Load the config record, writing [`AppConfig::sample`] to `path` first
    /// when there is none. A fresh sample still needs real credentials, so
    /// that case is reported as [`ConfigError::Missing`].
    pub async fn load_or_write_sample(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path).await {
            Err(ConfigError::Missing { path, .. }) => {
                Self::write_sample(&path).await?;
                tracing::info!(path = %path.display(), "Wrote sample config");
                Err(ConfigError::Missing {
                    path,
                    hint: "Created a sample. Please edit it with your app credentials and run again.",
                })
            }
            other => other,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid("client_id is empty".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("client_secret is empty".to_string()));
        }
        self.start_time()?;
        Ok(())
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI)
    }

    pub fn scope(&self) -> &str {
        self.scope.as_deref().unwrap_or(DEFAULT_SCOPE)
    }

    pub fn port(&self) -> u16 {
        self.default_port.unwrap_or(DEFAULT_PORT)
    }

    pub fn daily_steps(&self) -> u32 {
        self.daily_steps.unwrap_or(DEFAULT_DAILY_STEPS)
    }

    /// Configured start time, falling back to 08:00.
    pub fn start_time(&self) -> Result<NaiveTime, ConfigError> {
        let raw = self.start_time.as_deref().unwrap_or(DEFAULT_START_TIME);
        parse_time_of_day(raw)
            .map_err(|_| ConfigError::Invalid(format!("start_time {raw:?} is not HH:MM")))
    }
}

/// Remote endpoints and HTTP client settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Browser-facing authorization page
    pub authorize_url: String,
    /// OAuth token endpoint (code exchange and refresh)
    pub token_url: String,
    /// Per-user API root, e.g. `https://api.fitbit.com/1/user/-`
    pub api_base: String,
    /// Timeout applied to every outbound request
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            authorize_url: "https://www.fitbit.com/oauth2/authorize".to_string(),
            token_url: "https://api.fitbit.com/oauth2/token".to_string(),
            api_base: "https://api.fitbit.com/1/user/-".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Defaults overridden by `FITBIT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let request_timeout = match env::var("FITBIT_HTTP_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("FITBIT_HTTP_TIMEOUT_SECS {v:?} is not a number"))
            })?),
            Err(_) => defaults.request_timeout,
        };

        Ok(Self {
            authorize_url: env::var("FITBIT_AUTHORIZE_URL").unwrap_or(defaults.authorize_url),
            token_url: env::var("FITBIT_TOKEN_URL").unwrap_or(defaults.token_url),
            api_base: env::var("FITBIT_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            request_timeout,
        })
    }

    /// Endpoints of a local test server at `base` (e.g. `http://127.0.0.1:4000`).
    pub fn for_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{base}/oauth2/authorize"),
            token_url: format!("{base}/oauth2/token"),
            api_base: format!("{base}/1/user/-"),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{} missing. {hint}", .path.display())]
    Missing { path: PathBuf, hint: &'static str },

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_minimal_config() {
        let config: AppConfig =
            serde_json::from_str(r#"{"client_id":"ABC123","client_secret":"s3cret"}"#).unwrap();

        assert_eq!(config.redirect_uri(), "http://127.0.0.1:8080/");
        assert_eq!(config.scope(), "activity");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.daily_steps(), 10_000);
        assert_eq!(
            config.start_time().unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let err = AppConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
        assert!(err.to_string().contains("fitbit_config.json missing"));
    }

    #[tokio::test]
    async fn test_load_rejects_bad_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(
            &path,
            r#"{"client_id":"a","client_secret":"b","start_time":"morning"}"#,
        )
        .await
        .unwrap();

        let err = AppConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_sample_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        AppConfig::write_sample(&path).await.unwrap();
        let config = AppConfig::load(&path).await.unwrap();

        assert_eq!(config, AppConfig::sample());
        assert_eq!(config.client_id, "YOUR_CLIENT_ID");
    }

    #[tokio::test]
    async fn test_load_or_write_sample_creates_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let err = AppConfig::load_or_write_sample(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
        assert!(err.to_string().contains("Created a sample"));

        assert!(path.exists());
        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config, AppConfig::sample());
    }

    #[tokio::test]
    async fn test_load_or_write_sample_keeps_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let raw = r#"{"client_id":"ABC123","client_secret":"s3cret"}"#;
        tokio::fs::write(&path, raw).await.unwrap();

        let config = AppConfig::load_or_write_sample(&path).await.unwrap();
        assert_eq!(config.client_id, "ABC123");
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), raw);
    }

    #[test]
    fn test_api_config_for_base_url() {
        let api = ApiConfig::for_base_url("http://127.0.0.1:4000/");
        assert_eq!(api.token_url, "http://127.0.0.1:4000/oauth2/token");
        assert_eq!(api.api_base, "http://127.0.0.1:4000/1/user/-");
    }
}
