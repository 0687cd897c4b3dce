// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Portafirmas Gateway Server
//!
//! Fronts the e-signature portal backend: manages session credentials,
//! gates proxied API calls against page entitlements, and relays
//! realtime notifications to browsers.

use portafirmas_gateway::{
    config::Config,
    services::{SessionRegistry, UpstreamClient, WsTransport},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Portafirmas Gateway");

    // Upstream REST client, shared by session resolution and the proxy
    let upstream = UpstreamClient::new(config.upstream_api_url.clone());
    tracing::info!(url = %config.upstream_api_url, "Upstream client initialized");

    // Realtime transport for session engines
    let transport = Arc::new(WsTransport::new(config.realtime_url.clone()));
    tracing::info!(url = %config.realtime_url, "Realtime transport initialized");

    // Session registry: one engine per live browser session
    let sessions = SessionRegistry::new(
        Arc::new(upstream.clone()),
        transport,
        config.forbidden_path.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        upstream,
        sessions,
    });

    // Build router
    let app = portafirmas_gateway::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("portafirmas_gateway=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
