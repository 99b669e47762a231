// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth redirect target served on the loopback listener.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Router,
};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

const SUCCESS_PAGE: &str =
    "<html><body><h2>Authorized. You can close this window.</h2></body></html>";
const FAILURE_PAGE: &str = "<html><body><h2>No code found.</h2></body></html>";

/// Write-once slot the handler uses to hand the authorization code to the
/// waiting login flow. `None` is sent when the callback carried no code.
pub type CodeSlot = Arc<Mutex<Option<oneshot::Sender<Option<String>>>>>;

/// Create a slot and the receiver the login flow awaits.
pub fn code_channel() -> (CodeSlot, oneshot::Receiver<Option<String>>) {
    let (tx, rx) = oneshot::channel();
    (Arc::new(Mutex::new(Some(tx))), rx)
}

/// Every path is a redirect target; the redirect URI may carry any path.
pub fn router(slot: CodeSlot) -> Router {
    Router::new().fallback(callback).with_state(slot)
}

/// First non-empty value of `key`; a repeated parameter keeps its first value.
fn first_value(params: &[(String, String)], key: &str) -> Option<String> {
    params
        .iter()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.clone())
}

async fn callback(
    State(slot): State<CodeSlot>,
    query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> impl IntoResponse {
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Malformed callback query");
            Vec::new()
        }
    };

    if let Some(error) = first_value(&params, "error") {
        tracing::warn!(
            error = %error,
            description = %first_value(&params, "error_description").unwrap_or_default(),
            "OAuth error from Fitbit"
        );
    }

    let code = first_value(&params, "code");
    let status = if code.is_some() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    // Only the first request is reported; later ones just get a page
    let sender = slot.lock().ok().and_then(|mut guard| guard.take());
    match sender {
        Some(tx) => {
            let _ = tx.send(code);
        }
        None => tracing::debug!("Callback already handled, ignoring request"),
    }

    let page = if status == StatusCode::OK {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };

    (status, [(header::CONNECTION, "close")], Html(page))
}
