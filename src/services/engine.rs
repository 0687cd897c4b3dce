// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session engine: one browser session's authorization state.
//!
//! An engine bundles a credential store, a session resolver, a route
//! guard and a realtime channel manager. The store is the single source
//! of truth: rotating or clearing the credential there fans out to the
//! resolver (re-fetch) and the channel manager (re-authenticate)
//! independently. Neither ever writes back to the store.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::services::credential::CredentialStore;
use crate::services::guard::RouteGuard;
use crate::services::realtime::{ChannelManager, ChannelStatus, RealtimeEvent, Transport};
use crate::services::session::{ProfileFetcher, SessionResolver, SessionSnapshot};

/// Buffered notification events per engine before slow browser readers lag.
const EVENT_BUFFER: usize = 64;

pub struct SessionEngine {
    store: CredentialStore,
    resolver: SessionResolver,
    channel: ChannelManager,
    guard: RouteGuard,
    events: broadcast::Sender<RealtimeEvent>,
}

impl SessionEngine {
    /// Build an engine and, if a credential is given, start resolving
    /// and connecting for it.
    pub fn new(
        credential: Option<String>,
        fetcher: Arc<dyn ProfileFetcher>,
        transport: Arc<dyn Transport>,
        forbidden_path: &str,
    ) -> Arc<Self> {
        let store = CredentialStore::new();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let resolver = SessionResolver::spawn(&store, fetcher);
        let channel = ChannelManager::spawn(&store, transport, events.clone());

        if let Some(credential) = credential {
            store.set(credential);
        }

        Arc::new(Self {
            store,
            resolver,
            channel,
            guard: RouteGuard::new(forbidden_path),
            events,
        })
    }

    /// Replace the credential; resolver and channel re-bind to it.
    pub fn rotate(&self, credential: String) {
        self.store.set(credential);
    }

    /// Drop the credential; the session goes idle and the channel
    /// disconnects without reconnecting.
    pub fn sign_out(&self) {
        self.store.clear();
    }

    /// Bearer currently bound to this engine.
    pub fn credential(&self) -> Option<String> {
        self.store.get()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.resolver.snapshot()
    }

    /// Snapshot once resolution has settled (never `Loading`).
    pub async fn settled(&self) -> SessionSnapshot {
        self.resolver.settled().await
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn channel_status(&self) -> ChannelStatus {
        self.channel.status()
    }

    /// Subscribe to notification events relayed from the realtime
    /// channel. Only events from the connection bound to the current
    /// credential ever arrive here.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }
}

/// Owns the engines for all live browser sessions, keyed by the
/// session-id cookie (or a bearer-derived key for cookieless API
/// clients).
pub struct SessionRegistry {
    engines: DashMap<String, Arc<SessionEngine>>,
    fetcher: Arc<dyn ProfileFetcher>,
    transport: Arc<dyn Transport>,
    forbidden_path: String,
}

impl SessionRegistry {
    pub fn new(
        fetcher: Arc<dyn ProfileFetcher>,
        transport: Arc<dyn Transport>,
        forbidden_path: impl Into<String>,
    ) -> Self {
        Self {
            engines: DashMap::new(),
            fetcher,
            transport,
            forbidden_path: forbidden_path.into(),
        }
    }

    /// Create an engine for a fresh login and return its session id.
    pub fn create(&self, credential: String) -> (String, Arc<SessionEngine>) {
        let sid = uuid::Uuid::new_v4().to_string();
        let engine = SessionEngine::new(
            Some(credential),
            self.fetcher.clone(),
            self.transport.clone(),
            &self.forbidden_path,
        );
        self.engines.insert(sid.clone(), engine.clone());
        tracing::info!(sessions = self.engines.len(), "Session engine created");
        (sid, engine)
    }

    /// Look up the engine for a request.
    ///
    /// Prefers the session-id cookie. When the id is unknown (gateway
    /// restart) but the request still carries a credential, the engine
    /// is restored under the same key. Callers without a session cookie
    /// but with their own bearer get an engine keyed by that bearer, so
    /// machine clients are gated like everyone else.
    pub fn resolve(
        &self,
        sid: Option<&str>,
        bearer: Option<&str>,
    ) -> Option<(String, Arc<SessionEngine>)> {
        let key = match (sid, bearer) {
            (Some(sid), _) => sid.to_string(),
            (None, Some(token)) => format!("bearer:{token}"),
            (None, None) => return None,
        };

        if let Some(engine) = self.engines.get(&key) {
            return Some((key.clone(), engine.clone()));
        }

        let credential = bearer?.to_string();
        let engine = SessionEngine::new(
            Some(credential),
            self.fetcher.clone(),
            self.transport.clone(),
            &self.forbidden_path,
        );
        self.engines.insert(key.clone(), engine.clone());
        tracing::debug!("Session engine restored from credential");
        Some((key, engine))
    }

    /// Tear down an engine: clear its credential (disconnecting the
    /// channel) and drop it from the registry.
    pub fn remove(&self, key: &str) {
        if let Some((_, engine)) = self.engines.remove(key) {
            engine.sign_out();
            tracing::info!(sessions = self.engines.len(), "Session engine removed");
        }
    }
}
