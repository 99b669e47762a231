// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled runner: make sure the token works, then log the day's steps.

use chrono::{NaiveDate, NaiveTime};
use std::path::Path;

use crate::config::{ApiConfig, AppConfig};
use crate::db::TokenStore;
use crate::error::Result;
use crate::models::ActivityLogEntry;
use crate::services::fitbit::{FitbitClient, FitbitService, LogOutcome, TokenCheck};
use crate::time_utils::utc_today;

/// Per-run overrides of the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct LogOverrides {
    pub steps: Option<u32>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
}

/// One Runner invocation.
pub struct HostRunner {
    config: AppConfig,
    service: FitbitService,
}

impl HostRunner {
    /// Load the config and credential records. No network traffic happens
    /// here, so a missing file aborts the run before any API call.
    pub async fn from_files(config_path: &Path, token_path: &Path, api: ApiConfig) -> Result<Self> {
        let config = AppConfig::load(config_path).await?;
        let store = TokenStore::new(token_path);
        let credentials = store.load().await?;

        let client = FitbitClient::new(config.client_id.clone(), config.client_secret.clone(), api)?;
        Ok(Self {
            service: FitbitService::new(client, store, credentials),
            config,
        })
    }

    /// Build the entry to submit: explicit override, else configured default.
    pub fn entry(&self, overrides: &LogOverrides) -> Result<ActivityLogEntry> {
        let start_time = match overrides.start_time {
            Some(t) => t,
            None => self.config.start_time()?,
        };

        Ok(ActivityLogEntry::new(
            overrides.steps.unwrap_or_else(|| self.config.daily_steps()),
            overrides.date.unwrap_or_else(utc_today),
            start_time,
        ))
    }

    /// Probe the access token and refresh it on 401.
    pub async fn check_token(&mut self) -> Result<TokenCheck> {
        let check = self.service.refresh_if_needed().await?;
        match check {
            TokenCheck::Valid => tracing::debug!("Token check passed"),
            TokenCheck::Refreshed => tracing::info!("Token refreshed before submission"),
        }
        Ok(check)
    }

    /// Submit `entry`. A 401 here gets one refresh and one resubmission.
    pub async fn submit(&mut self, entry: &ActivityLogEntry) -> Result<LogOutcome> {
        self.service.log_steps(entry).await
    }

    /// Probe, refresh if needed, submit.
    pub async fn run(&mut self, overrides: &LogOverrides) -> Result<LogOutcome> {
        let entry = self.entry(overrides)?;
        self.check_token().await?;
        self.submit(&entry).await
    }

    pub fn service(&self) -> &FitbitService {
        &self.service
    }
}
