// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime notification channel, bound to the current credential.
//!
//! The manager owns exactly one logical connection per session engine
//! and keeps its authentication glued to the credential store: every
//! credential change supersedes the running connection *immediately* —
//! the old transport stops being read before its teardown completes, so
//! nothing received over a stale credential can reach subscribers. For
//! rapid rotations only convergence is guaranteed: the terminal
//! connected state always authenticates with the store's final value,
//! while intermediate credentials may never produce an observable
//! connection at all.
//!
//! The state machine is driven by exactly two event sources — store
//! changes and transport events — inside one task, which makes the
//! last-write-wins behavior directly testable by injecting scripted
//! transports.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::services::credential::{CredentialStore, Subscription};

/// A notification event pushed by the upstream realtime endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub kind: String,
    pub document_id: Option<i64>,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

impl RealtimeEvent {
    /// Parse an upstream text frame leniently.
    ///
    /// Unknown shapes degrade to a raw `mensaje` event carrying the
    /// frame text; a notification is never dropped for being malformed.
    pub fn from_frame(text: &str) -> Self {
        let value: Value = serde_json::from_str(text).unwrap_or(Value::Null);
        let kind = value
            .get("tipo")
            .or_else(|| value.get("kind"))
            .and_then(Value::as_str)
            .unwrap_or("mensaje")
            .to_string();
        let document_id = value
            .get("documentoId")
            .or_else(|| value.get("documento_id"))
            .and_then(Value::as_i64);
        let message = value
            .get("mensaje")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(text)
            .to_string();
        Self {
            kind,
            document_id,
            message,
            received_at: Utc::now(),
        }
    }
}

/// Transport-level failure.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Opens authenticated connections. The production implementation is
/// [`WsTransport`]; tests inject scripted ones.
///
/// `connect` owns the retry/backoff policy: it resolves once a
/// connection is established and should only return an error when the
/// transport has given up for good. A superseded attempt is simply
/// dropped mid-flight.
pub trait Transport: Send + Sync + 'static {
    fn connect(
        &self,
        credential: String,
    ) -> BoxFuture<'static, Result<Box<dyn Connection>, TransportError>>;
}

/// One live connection.
pub trait Connection: Send {
    /// Next event, or `None` once the transport has closed.
    fn next_event(&mut self) -> BoxFuture<'_, Option<RealtimeEvent>>;

    /// Graceful teardown. Callers do not wait for this to finish.
    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// Observable state of the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Disconnected,
    Connecting { credential: String },
    Connected { credential: String },
    Reconnecting { credential: String },
}

/// Owns the channel state machine for one session engine.
pub struct ChannelManager {
    status_rx: watch::Receiver<ChannelStatus>,
    subscription: Subscription,
}

impl ChannelManager {
    /// Subscribe to the store and start the driver task.
    ///
    /// An empty store means no connection attempt is made: an
    /// unauthenticated session never opens a channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        store: &CredentialStore,
        transport: Arc<dyn Transport>,
        events: broadcast::Sender<RealtimeEvent>,
    ) -> Self {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let subscription = store.subscribe(move |credential| {
            let _ = change_tx.send(credential.map(str::to_string));
        });
        let initial = store.get();

        let (status_tx, status_rx) = watch::channel(ChannelStatus::Disconnected);
        tokio::spawn(run(transport, change_rx, initial, status_tx, events));

        Self {
            status_rx,
            subscription,
        }
    }

    pub fn status(&self) -> ChannelStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch handle for awaiting state transitions.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status_rx.clone()
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        // Detaches the store listener; the driver drains, closes any
        // live connection and exits.
        self.subscription.cancel();
    }
}

enum Phase {
    Idle,
    Connect { credential: String, initial: bool },
    Open { credential: String, conn: Box<dyn Connection> },
}

enum OpenExit {
    TransportClosed,
    Cleared,
    Superseded(String),
    Shutdown,
}

fn nonempty(credential: Option<String>) -> Option<String> {
    credential.filter(|c| !c.is_empty())
}

enum Drained {
    /// No relevant change queued; the connection is still current.
    Current,
    /// A queued change superseded the connection.
    Exit(OpenExit),
}

/// Drain queued store changes before forwarding an event. If any of
/// them moved the store off `credential`, the connection is stale and
/// the event must not be attributed to the new credential's context.
fn drain_changes(
    changes: &mut mpsc::UnboundedReceiver<Option<String>>,
    credential: &str,
) -> Drained {
    loop {
        match changes.try_recv() {
            Ok(change) => match nonempty(change) {
                Some(next) if next != credential => {
                    return Drained::Exit(OpenExit::Superseded(next));
                }
                Some(_) => {}
                None => return Drained::Exit(OpenExit::Cleared),
            },
            Err(mpsc::error::TryRecvError::Empty) => return Drained::Current,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                return Drained::Exit(OpenExit::Shutdown);
            }
        }
    }
}

async fn run(
    transport: Arc<dyn Transport>,
    mut changes: mpsc::UnboundedReceiver<Option<String>>,
    initial: Option<String>,
    status_tx: watch::Sender<ChannelStatus>,
    events: broadcast::Sender<RealtimeEvent>,
) {
    let mut phase = match nonempty(initial) {
        Some(credential) => Phase::Connect {
            credential,
            initial: true,
        },
        None => Phase::Idle,
    };

    loop {
        phase = match phase {
            Phase::Idle => {
                let _ = status_tx.send(ChannelStatus::Disconnected);
                match changes.recv().await {
                    None => return,
                    Some(change) => match nonempty(change) {
                        Some(credential) => Phase::Connect {
                            credential,
                            initial: true,
                        },
                        None => Phase::Idle,
                    },
                }
            }

            Phase::Connect { credential, initial } => {
                let _ = status_tx.send(if initial {
                    ChannelStatus::Connecting {
                        credential: credential.clone(),
                    }
                } else {
                    ChannelStatus::Reconnecting {
                        credential: credential.clone(),
                    }
                });

                let mut connect = transport.connect(credential.clone());
                loop {
                    tokio::select! {
                        result = &mut connect => match result {
                            Ok(conn) => break Phase::Open { credential, conn },
                            Err(err) => {
                                tracing::warn!(error = %err, "Realtime transport gave up");
                                break Phase::Idle;
                            }
                        },
                        change = changes.recv() => match change {
                            None => return,
                            Some(change) => match nonempty(change) {
                                // The in-flight attempt is dropped; only
                                // the latest credential matters.
                                Some(next) if next != credential => break Phase::Connect {
                                    credential: next,
                                    initial: false,
                                },
                                Some(_) => {}
                                None => break Phase::Idle,
                            },
                        },
                    }
                }
            }

            Phase::Open { credential, mut conn } => {
                let _ = status_tx.send(ChannelStatus::Connected {
                    credential: credential.clone(),
                });
                tracing::debug!("Realtime channel connected");

                let exit = loop {
                    let next = conn.next_event();
                    tokio::select! {
                        event = next => match event {
                            Some(event) => {
                                // A store change that raced this event
                                // already made the connection stale, so
                                // check the queue before forwarding.
                                match drain_changes(&mut changes, &credential) {
                                    Drained::Current => {
                                        let _ = events.send(event);
                                    }
                                    Drained::Exit(exit) => break exit,
                                }
                            }
                            None => break OpenExit::TransportClosed,
                        },
                        change = changes.recv() => match change {
                            None => break OpenExit::Shutdown,
                            Some(change) => match nonempty(change) {
                                Some(next) if next != credential => break OpenExit::Superseded(next),
                                Some(_) => {}
                                None => break OpenExit::Cleared,
                            },
                        },
                    }
                };

                // From here the old connection is already stale: it is
                // closed in the background and nothing read from it can
                // be forwarded anymore.
                match exit {
                    OpenExit::TransportClosed => Phase::Connect {
                        credential,
                        initial: false,
                    },
                    OpenExit::Cleared => {
                        tokio::spawn(conn.close());
                        Phase::Idle
                    }
                    OpenExit::Superseded(next) => {
                        tokio::spawn(conn.close());
                        Phase::Connect {
                            credential: next,
                            initial: false,
                        }
                    }
                    OpenExit::Shutdown => {
                        tokio::spawn(conn.close());
                        return;
                    }
                }
            }
        };
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WsTransport - production WebSocket transport
// ─────────────────────────────────────────────────────────────────────────────

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// WebSocket transport to the upstream notification endpoint.
///
/// The credential travels as the `access_token` query parameter of the
/// connection URL; the server closes connections whose credential is
/// invalid or expired, which lands back here as an ordinary retry.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn connect_url(&self, credential: &str) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}access_token={}",
            self.url,
            separator,
            urlencoding::encode(credential)
        )
    }
}

impl Transport for WsTransport {
    fn connect(
        &self,
        credential: String,
    ) -> BoxFuture<'static, Result<Box<dyn Connection>, TransportError>> {
        let url = self.connect_url(&credential);
        Box::pin(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                match connect_async(url.as_str()).await {
                    Ok((stream, _response)) => {
                        return Ok(Box::new(WsConnection { stream }) as Box<dyn Connection>);
                    }
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            retry_in_ms = backoff.as_millis() as u64,
                            "Realtime connect failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        })
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection for WsConnection {
    fn next_event(&mut self) -> BoxFuture<'_, Option<RealtimeEvent>> {
        Box::pin(async move {
            while let Some(message) = self.stream.next().await {
                match message {
                    Ok(Message::Text(text)) => return Some(RealtimeEvent::from_frame(&text)),
                    Ok(Message::Ping(payload)) => {
                        let _ = self.stream.send(Message::Pong(payload)).await;
                    }
                    Ok(Message::Close(_)) | Err(_) => return None,
                    Ok(_) => {}
                }
            }
            None
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let mut stream = self.stream;
            let _ = stream.close(None).await;
        })
    }
}
