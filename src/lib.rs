// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fitbit-Steps: keep a Fitbit account's daily walking log filled in
//!
//! This crate provides the OAuth login flow that links a Fitbit account and
//! the scheduled runner that refreshes its token and logs the day's steps.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
