// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity log entry submitted to Fitbit.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

/// Fitbit activity ID for "Walking".
pub const WALKING_ACTIVITY_ID: u32 = 90013;

/// Kilometers per step used for the derived distance.
const KM_PER_STEP: f64 = 0.0008;

/// Steps per minute used for the derived duration.
const STEPS_PER_MINUTE: u32 = 100;

/// One walking session to log. Built per run, never stored locally.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityLogEntry {
    pub steps: u32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

impl ActivityLogEntry {
    pub fn new(steps: u32, date: NaiveDate, start_time: NaiveTime) -> Self {
        Self {
            steps,
            date,
            start_time,
        }
    }

    /// Walking time in whole minutes, at least one.
    pub fn duration_minutes(&self) -> u64 {
        u64::from((self.steps / STEPS_PER_MINUTE).max(1))
    }

    pub fn duration_millis(&self) -> u64 {
        self.duration_minutes() * 60 * 1000
    }

    /// Distance in kilometers, rounded to 3 decimals.
    pub fn distance(&self) -> f64 {
        (f64::from(self.steps) * KM_PER_STEP * 1000.0).round() / 1000.0
    }

    /// Form body for `POST /activities.json`.
    pub fn to_form(&self) -> ActivityLogForm {
        ActivityLogForm {
            activity_id: WALKING_ACTIVITY_ID,
            start_time: self.start_time.format("%H:%M").to_string(),
            duration_millis: self.duration_millis(),
            date: self.date.format("%Y-%m-%d").to_string(),
            distance: self.distance(),
            steps: self.steps,
        }
    }
}

/// Wire form of an [`ActivityLogEntry`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogForm {
    pub activity_id: u32,
    pub start_time: String,
    pub duration_millis: u64,
    pub date: String,
    pub distance: f64,
    pub steps: u32,
}
