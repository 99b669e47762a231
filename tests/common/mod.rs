// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::{Form, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fitbit_steps::config::ApiConfig;
use fitbit_steps::models::CredentialRecord;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A request the mock Fitbit API received.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Recorded {
    pub endpoint: &'static str,
    pub authorization: String,
    pub form: HashMap<String, String>,
}

#[derive(Default)]
struct Script {
    probe: VecDeque<u16>,
    token: VecDeque<(u16, Value)>,
    submit: VecDeque<(u16, Value)>,
    calls: Vec<Recorded>,
}

/// In-process stand-in for the Fitbit API with scripted responses.
///
/// Unscripted calls answer 500 so a test notices unexpected traffic.
#[derive(Clone, Default)]
pub struct MockFitbit {
    script: Arc<Mutex<Script>>,
}

#[allow(dead_code)]
impl MockFitbit {
    pub fn probe(&self, status: u16) -> &Self {
        self.script.lock().unwrap().probe.push_back(status);
        self
    }

    pub fn token(&self, status: u16, body: Value) -> &Self {
        self.script.lock().unwrap().token.push_back((status, body));
        self
    }

    pub fn submit(&self, status: u16, body: Value) -> &Self {
        self.script.lock().unwrap().submit.push_back((status, body));
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<Recorded> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint == endpoint)
            .collect()
    }

    /// Serve on an ephemeral loopback port and return matching endpoints.
    pub async fn start(&self) -> ApiConfig {
        let app = Router::new()
            .route("/oauth2/token", post(token))
            .route("/1/user/-/activities/date/{day}", get(probe))
            .route("/1/user/-/activities.json", post(submit))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        ApiConfig::for_base_url(&format!("http://{}", addr))
    }

    fn record(&self, endpoint: &'static str, headers: &HeaderMap, form: HashMap<String, String>) {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.script.lock().unwrap().calls.push(Recorded {
            endpoint,
            authorization,
            form,
        });
    }
}

fn reply(scripted: Option<(u16, Value)>) -> Response {
    let (status, body) = scripted.unwrap_or((500, json!({"errors": "unscripted call"})));
    (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
}

async fn token(
    State(mock): State<MockFitbit>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    mock.record("token", &headers, form);
    let next = mock.script.lock().unwrap().token.pop_front();
    reply(next)
}

async fn probe(State(mock): State<MockFitbit>, headers: HeaderMap) -> Response {
    mock.record("probe", &headers, HashMap::new());
    let next = mock.script.lock().unwrap().probe.pop_front();
    reply(next.map(|status| (status, json!({"summary": {"steps": 0}}))))
}

async fn submit(
    State(mock): State<MockFitbit>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    mock.record("submit", &headers, form);
    let next = mock.script.lock().unwrap().submit.pop_front();
    reply(next)
}

/// Write a config and a credential record into `dir`.
#[allow(dead_code)]
pub fn seed_files(dir: &Path, access: &str, refresh: &str) -> (PathBuf, PathBuf) {
    let config = dir.join("fitbit_config.json");
    std::fs::write(
        &config,
        json!({
            "client_id": "client",
            "client_secret": "secret",
            "daily_steps": 10000,
            "start_time": "08:00"
        })
        .to_string(),
    )
    .unwrap();

    let tokens = dir.join("fitbit_tokens.json");
    let record = CredentialRecord {
        access_token: access.to_string(),
        refresh_token: Some(refresh.to_string()),
        scope: Some("activity".to_string()),
        token_type: Some("Bearer".to_string()),
        expires_in: Some(28800),
        updated_at: "2020-01-01T00:00:00Z".to_string(),
    };
    std::fs::write(&tokens, serde_json::to_vec_pretty(&record).unwrap()).unwrap();

    (config, tokens)
}

/// `Basic base64("client:secret")`
#[allow(dead_code)]
pub const CLIENT_BASIC_AUTH: &str = "Basic Y2xpZW50OnNlY3JldA==";
