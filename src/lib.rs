// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Portafirmas gateway: session-bound authorization and realtime
//! notifications for the e-signature portal.
//!
//! This crate sits between the portal's browser clients and the opaque
//! REST backend. It owns the credential lifecycle (login, rotation,
//! logout), resolves per-user page/role entitlements, gates proxied API
//! calls against them, and keeps one upstream realtime connection per
//! session bound to the current credential.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::{SessionRegistry, UpstreamClient};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub upstream: UpstreamClient,
    pub sessions: SessionRegistry,
}
