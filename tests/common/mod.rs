// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test support: mock collaborators and an offline app builder.

use chrono::Utc;
use futures_util::future::BoxFuture;
use portafirmas_gateway::config::Config;
use portafirmas_gateway::models::{Page, Session};
use portafirmas_gateway::routes::create_router;
use portafirmas_gateway::services::realtime::{
    Connection, RealtimeEvent, Transport, TransportError,
};
use portafirmas_gateway::services::session::ProfileFetcher;
use portafirmas_gateway::services::upstream::{UpstreamClient, UpstreamError};
use portafirmas_gateway::services::SessionRegistry;
use portafirmas_gateway::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Session fixture with one page per path.
#[allow(dead_code)]
pub fn test_session(user_id: i64, page_paths: &[&str]) -> Session {
    Session {
        user_id,
        display_name: "Prueba Usuario".to_string(),
        pages: page_paths
            .iter()
            .enumerate()
            .map(|(i, path)| Page {
                id: i as i64 + 1,
                code: format!("PAG{}", i + 1),
                name: format!("Página {}", i + 1),
                path: path.to_string(),
                icon: None,
                order: Some(i as i32),
            })
            .collect(),
        roles: vec!["REVISA".to_string()],
        signature_url: None,
        has_signature: false,
    }
}

/// Notification event fixture.
#[allow(dead_code)]
pub fn test_event(kind: &str) -> RealtimeEvent {
    RealtimeEvent {
        kind: kind.to_string(),
        document_id: Some(1),
        message: format!("evento {kind}"),
        received_at: Utc::now(),
    }
}

/// Await a future with the standard test timeout.
#[allow(dead_code)]
pub async fn within<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out waiting for test condition")
}

// ─── Profile fetchers ────────────────────────────────────────────────

/// Fetcher that resolves immediately with a fixed result
/// (`Err(status)` simulates an upstream non-2xx).
#[allow(dead_code)]
pub struct StaticFetcher(pub Result<Session, u16>);

impl ProfileFetcher for StaticFetcher {
    fn fetch_profile(
        &self,
        _credential: String,
    ) -> BoxFuture<'static, Result<Session, UpstreamError>> {
        let result = self
            .0
            .clone()
            .map_err(|code| UpstreamError::Status(code, String::new()));
        Box::pin(async move { result })
    }
}

/// One profile fetch surfaced to the test, completed on demand.
#[allow(dead_code)]
pub struct FetchRequest {
    pub credential: String,
    pub respond: oneshot::Sender<Result<Session, UpstreamError>>,
}

/// Fetcher whose completions the test controls.
#[allow(dead_code)]
pub struct ControlledFetcher {
    requests: mpsc::UnboundedSender<FetchRequest>,
}

#[allow(dead_code)]
impl ControlledFetcher {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FetchRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { requests }), rx)
    }
}

impl ProfileFetcher for ControlledFetcher {
    fn fetch_profile(
        &self,
        credential: String,
    ) -> BoxFuture<'static, Result<Session, UpstreamError>> {
        let (respond, rx) = oneshot::channel();
        let _ = self.requests.send(FetchRequest {
            credential,
            respond,
        });
        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Transport("fetch abandoned".to_string())),
            }
        })
    }
}

// ─── Realtime transports ─────────────────────────────────────────────

/// Transport whose connect never completes. Used where the realtime
/// channel is irrelevant to the test.
#[allow(dead_code)]
pub struct PendingTransport;

impl Transport for PendingTransport {
    fn connect(
        &self,
        _credential: String,
    ) -> BoxFuture<'static, Result<Box<dyn Connection>, TransportError>> {
        Box::pin(futures_util::future::pending())
    }
}

/// One connect attempt surfaced to the test, completed on demand.
#[allow(dead_code)]
pub struct ConnectRequest {
    pub credential: String,
    pub respond: oneshot::Sender<Result<Box<dyn Connection>, TransportError>>,
}

/// Transport whose connections the test scripts deterministically.
#[allow(dead_code)]
pub struct ScriptedTransport {
    connects: mpsc::UnboundedSender<ConnectRequest>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ConnectRequest>) {
        let (connects, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { connects }), rx)
    }
}

impl Transport for ScriptedTransport {
    fn connect(
        &self,
        credential: String,
    ) -> BoxFuture<'static, Result<Box<dyn Connection>, TransportError>> {
        let (respond, rx) = oneshot::channel();
        let _ = self.connects.send(ConnectRequest {
            credential,
            respond,
        });
        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(TransportError("connect abandoned".to_string())),
            }
        })
    }
}

/// Scripted connection: the test pushes events through the handle;
/// dropping the handle simulates a transport-initiated close.
#[allow(dead_code)]
pub struct ScriptedConnection {
    events: mpsc::UnboundedReceiver<RealtimeEvent>,
    closed: Arc<AtomicBool>,
}

#[allow(dead_code)]
pub struct ConnectionHandle {
    pub events: mpsc::UnboundedSender<RealtimeEvent>,
    closed: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl ScriptedConnection {
    pub fn new() -> (Box<dyn Connection>, ConnectionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Box::new(Self {
                events: rx,
                closed: closed.clone(),
            }),
            ConnectionHandle { events: tx, closed },
        )
    }
}

#[allow(dead_code)]
impl ConnectionHandle {
    pub fn push(&self, event: RealtimeEvent) {
        let _ = self.events.send(event);
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for ScriptedConnection {
    fn next_event(&mut self) -> BoxFuture<'_, Option<RealtimeEvent>> {
        Box::pin(async move { self.events.recv().await })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        self.closed.store(true, Ordering::SeqCst);
        Box::pin(async {})
    }
}

// ─── App builder ─────────────────────────────────────────────────────

/// Create a test app with offline mock collaborators.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_session(test_session(5, &["/documentos"]))
}

/// Same, with a specific session resolved for every credential.
#[allow(dead_code)]
pub fn create_test_app_with_session(session: Session) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let upstream = UpstreamClient::new(config.upstream_api_url.clone());
    let sessions = SessionRegistry::new(
        Arc::new(StaticFetcher(Ok(session))),
        Arc::new(PendingTransport),
        config.forbidden_path.clone(),
    );

    let state = Arc::new(AppState {
        config,
        upstream,
        sessions,
    });

    (create_router(state.clone()), state)
}
