// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod fitbit;
pub mod host;
pub mod login;

pub use fitbit::{FitbitClient, FitbitService, LogOutcome, Submission, TokenCheck};
pub use host::{HostRunner, LogOverrides};
pub use login::{Authorizer, CallbackListener, CALLBACK_TIMEOUT};
