// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod credentials;

pub use activity::{ActivityLogEntry, ActivityLogForm, WALKING_ACTIVITY_ID};
pub use credentials::CredentialRecord;
