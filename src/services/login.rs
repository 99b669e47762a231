// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Interactive OAuth authorization-code flow.
//!
//! Builds the authorization URL, listens for exactly one redirect on the
//! loopback address named by the redirect URI, exchanges the code and
//! persists the resulting credential record.

use chrono::Utc;
use reqwest::Url;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::AppConfig;
use crate::db::TokenStore;
use crate::error::{AppError, Result};
use crate::models::CredentialRecord;
use crate::routes::{code_channel, create_router};
use crate::services::fitbit::FitbitClient;

/// How long the login flow waits for the browser redirect.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Upper bound on draining the callback server after the code arrived.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Drives one account linkage.
pub struct Authorizer {
    config: AppConfig,
    client: FitbitClient,
    store: TokenStore,
}

impl Authorizer {
    pub fn new(config: AppConfig, client: FitbitClient, store: TokenStore) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    /// Browser-facing authorization page for the authorization-code grant.
    pub fn authorization_url(&self) -> String {
        format!(
            "{}?client_id={}&response_type=code&scope={}&redirect_uri={}",
            self.client.api().authorize_url,
            urlencoding::encode(self.client.client_id()),
            urlencoding::encode(self.config.scope()),
            urlencoding::encode(self.config.redirect_uri()),
        )
    }

    /// Address the callback listener binds, taken from the redirect URI.
    ///
    /// The port falls back to `default_port` when the URI has none, and
    /// `localhost` binds the IPv4 loopback.
    pub fn callback_addr(&self) -> Result<SocketAddr> {
        let redirect = Url::parse(self.config.redirect_uri()).map_err(|e| {
            AppError::CallbackServer(format!(
                "Invalid redirect_uri {:?}: {}",
                self.config.redirect_uri(),
                e
            ))
        })?;

        let ip = match redirect.host_str() {
            None | Some("localhost") => IpAddr::V4(Ipv4Addr::LOCALHOST),
            Some(host) => host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse()
                .map_err(|_| {
                    AppError::CallbackServer(format!(
                        "redirect_uri host {:?} is not a local IP address",
                        host
                    ))
                })?,
        };

        let port = redirect.port().unwrap_or_else(|| self.config.port());
        Ok(SocketAddr::new(ip, port))
    }

    /// Bind the callback listener.
    pub async fn listen(&self) -> Result<CallbackListener> {
        CallbackListener::bind(self.callback_addr()?).await
    }

    /// Wait for the redirect on `listener`, exchange the code and save the
    /// credential record.
    pub async fn complete(
        &self,
        listener: CallbackListener,
        timeout: Duration,
    ) -> Result<CredentialRecord> {
        let code = listener.wait_for_code(timeout).await?;
        tracing::info!("Got code, exchanging for token");

        let tokens = self
            .client
            .exchange_code(&code, self.config.redirect_uri())
            .await?;

        if tokens.refresh_token.is_none() {
            tracing::warn!("Token exchange returned no refresh token");
        }
        if let Some(user_id) = &tokens.user_id {
            tracing::info!(user_id = %user_id, "Fitbit account linked");
        }

        let record = CredentialRecord::from_token_response(tokens, Utc::now());
        self.store.save(&record).await?;
        Ok(record)
    }
}

/// Loopback listener that serves exactly one OAuth redirect.
pub struct CallbackListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl CallbackListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::CallbackServer(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::CallbackServer(e.to_string()))?;

        tracing::debug!(address = %local_addr, "Callback listener bound");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the first request arrives or `timeout` elapses, then shut
    /// the server down.
    pub async fn wait_for_code(self, timeout: Duration) -> Result<String> {
        let (slot, code_rx) = code_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = create_router(slot);
        let listener = self.listener;
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let outcome = tokio::time::timeout(timeout, code_rx).await;

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Callback server error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Callback server task failed"),
            Err(_) => tracing::warn!("Callback server did not shut down in time"),
        }

        match outcome {
            Ok(Ok(Some(code))) => Ok(code),
            Ok(Ok(None)) => Err(AppError::NoAuthorizationCode(
                "redirect did not carry a code".to_string(),
            )),
            Ok(Err(_)) => Err(AppError::NoAuthorizationCode(
                "callback server stopped".to_string(),
            )),
            Err(_) => Err(AppError::NoAuthorizationCode(format!(
                "timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn authorizer(redirect_uri: Option<&str>, default_port: Option<u16>) -> Authorizer {
        let config = AppConfig {
            client_id: "23ABCD".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: redirect_uri.map(str::to_string),
            scope: Some("activity heartrate".to_string()),
            default_port,
            daily_steps: None,
            start_time: None,
        };
        let client = FitbitClient::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            ApiConfig::default(),
        )
        .unwrap();
        Authorizer::new(config, client, TokenStore::new("unused.json"))
    }

    #[test]
    fn test_authorization_url() {
        let url = authorizer(None, None).authorization_url();
        assert_eq!(
            url,
            "https://www.fitbit.com/oauth2/authorize?client_id=23ABCD&response_type=code\
             &scope=activity%20heartrate&redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2F"
        );
    }

    #[test]
    fn test_callback_addr_from_redirect_uri() {
        let addr = authorizer(Some("http://127.0.0.1:9090/cb"), Some(8080))
            .callback_addr()
            .unwrap();
        assert_eq!(addr, "127.0.0.1:9090".parse().unwrap());
    }

    #[test]
    fn test_callback_addr_falls_back_to_default_port() {
        let addr = authorizer(Some("http://localhost/"), Some(8123))
            .callback_addr()
            .unwrap();
        assert_eq!(addr, "127.0.0.1:8123".parse().unwrap());
    }

    #[test]
    fn test_callback_addr_rejects_remote_host() {
        let err = authorizer(Some("https://example.com/callback"), None)
            .callback_addr()
            .unwrap_err();
        assert!(matches!(err, AppError::CallbackServer(_)));
    }
}
