// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit-Steps CLI
//!
//! `login` links a Fitbit account through the OAuth authorization-code flow;
//! `run` refreshes the stored token when needed and logs the day's steps.

use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use fitbit_steps::{
    config::{ApiConfig, AppConfig, CONFIG_FILE, TOKEN_FILE},
    db::TokenStore,
    error::{AppError, Result},
    services::{Authorizer, FitbitClient, HostRunner, LogOverrides, CALLBACK_TIMEOUT},
    time_utils::{format_utc_rfc3339, parse_time_of_day},
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fitbit-steps")]
#[command(about = "Link a Fitbit account and log daily steps")]
struct Cli {
    /// App/config record
    #[arg(long, global = true, env = "FITBIT_CONFIG_FILE", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Credential record
    #[arg(long, global = true, env = "FITBIT_TOKEN_FILE", default_value = TOKEN_FILE)]
    tokens: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize in the browser and save tokens
    Login {
        /// Only print the authorization URL
        #[arg(long)]
        no_browser: bool,

        /// Seconds to wait for the redirect
        #[arg(long, default_value_t = CALLBACK_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },

    /// Refresh the token if needed and log one activity
    Run {
        /// Steps to log instead of `daily_steps`
        #[arg(long)]
        steps: Option<u32>,

        /// Log date (YYYY-MM-DD), defaults to today in UTC
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Start time (HH:MM) instead of `start_time`
        #[arg(long, value_parser = parse_start_time)]
        start_time: Option<NaiveTime>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok(); // Load .env file if present

    let cli = Cli::parse();
    init_logging();

    let api = match ApiConfig::from_env() {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Login {
            no_browser,
            timeout_secs,
        } => {
            login(
                &cli.config,
                &cli.tokens,
                api,
                !no_browser,
                Duration::from_secs(timeout_secs),
            )
            .await
        }
        Commands::Run {
            steps,
            date,
            start_time,
        } => {
            let overrides = LogOverrides {
                steps,
                date,
                start_time,
            };
            run(&cli.config, &cli.tokens, api, &overrides).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            if e.is_token_error() {
                eprintln!("Run `fitbit-steps login` again to re-authorize.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn login(
    config_path: &Path,
    token_path: &Path,
    api: ApiConfig,
    open_browser: bool,
    timeout: Duration,
) -> Result<()> {
    let config = AppConfig::load_or_write_sample(config_path).await?;

    let store = TokenStore::new(token_path);
    let client = FitbitClient::new(config.client_id.clone(), config.client_secret.clone(), api)?;
    let authorizer = Authorizer::new(config, client, store.clone());

    let auth_url = authorizer.authorization_url();
    println!("Open this URL in your browser and Allow the app:");
    println!("{}", auth_url);

    let listener = authorizer.listen().await?;

    if open_browser {
        println!("\nTrying to open browser automatically...");
        if let Err(e) = webbrowser::open(&auth_url) {
            tracing::warn!(error = %e, "Could not open browser automatically");
        }
    }

    println!(
        "Waiting for redirect on http://{}/ ...",
        listener.local_addr()
    );

    let record = match authorizer.complete(listener, timeout).await {
        Ok(record) => record,
        Err(e @ AppError::NoAuthorizationCode(_)) => {
            println!("No code received. Make sure redirect uri matches and you allowed the app.");
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    println!("Saved tokens to {}", store.path().display());
    if let Some(scope) = &record.scope {
        println!("Granted scope: {}", scope);
    }
    println!(
        "Done. You can upload {} to your host server.",
        store.path().display()
    );
    Ok(())
}

async fn run(
    config_path: &Path,
    token_path: &Path,
    api: ApiConfig,
    overrides: &LogOverrides,
) -> Result<()> {
    let mut runner = HostRunner::from_files(config_path, token_path, api).await?;
    println!("Running at {}", format_utc_rfc3339(chrono::Utc::now()));

    let entry = runner.entry(overrides)?;

    if let Err(e) = runner.check_token().await {
        println!("Token refresh/check failed.");
        return Err(e);
    }

    match runner.submit(&entry).await {
        Ok(outcome) => {
            println!("Logged steps: {} date: {}", outcome.steps, outcome.date);
            if let Some(log_id) = &outcome.log_id {
                println!("logId: {}", log_id);
            }
            println!("Done.");
            Ok(())
        }
        Err(e) => {
            println!("Failed.");
            Err(e)
        }
    }
}

fn parse_start_time(value: &str) -> std::result::Result<NaiveTime, String> {
    parse_time_of_day(value).map_err(|_| format!("{value:?} is not HH:MM"))
}

/// Initialize logging on stderr; `LOG_FORMAT=json` selects structured JSON.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fitbit_steps=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        let format = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true);
        tracing_subscriber::registry().with(filter).with(format).init();
    } else {
        let format = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);
        tracing_subscriber::registry().with(filter).with(format).init();
    }
}
