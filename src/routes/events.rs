// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Browser-facing notification WebSocket.
//!
//! Relays the session engine's notification events to the browser as
//! JSON text frames. The engine's broadcast only ever carries events
//! from the connection bound to the current credential, so a browser
//! can never observe traffic from a superseded token.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::middleware::auth::SessionContext;
use crate::services::realtime::RealtimeEvent;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(events_handler))
}

async fn events_handler(
    Extension(context): Extension<SessionContext>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let receiver = context.engine.subscribe_events();
    ws.on_upgrade(move |socket| relay(socket, receiver))
}

async fn relay(mut socket: WebSocket, mut events: broadcast::Receiver<RealtimeEvent>) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Notification reader lagged, events skipped");
                }
                // Engine torn down (logout): end the relay.
                Err(broadcast::error::RecvError::Closed) => break,
            },
            message = socket.recv() => match message {
                // The browser sends nothing we act on; pings are
                // answered by the protocol layer.
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }

    let _ = socket.close().await;
}
