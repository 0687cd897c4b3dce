// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session resolution against the upstream profile endpoint.
//!
//! The resolver observes the credential store and keeps a
//! `{status, session, error}` snapshot current. Status transitions
//! happen synchronously inside the store notification (so a clear is
//! visible the moment `clear()` returns), while the profile fetch
//! itself runs on a spawned task. For racing fetches the rule is
//! last-credential-wins: a completion only applies if the credential it
//! fetched for is still the store's latest, so a stale fetch can never
//! overwrite a newer session (there is no cancellation token; stale
//! results are simply discarded when they complete).

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tokio::sync::Notify;

use crate::models::{Session, SessionStatus};
use crate::services::credential::{CredentialStore, Subscription};
use crate::services::upstream::UpstreamError;

/// Fetches the authenticated user's profile for a credential.
///
/// The production implementation is
/// [`crate::services::upstream::UpstreamClient`]; tests inject mocks.
pub trait ProfileFetcher: Send + Sync + 'static {
    fn fetch_profile(&self, credential: String)
        -> BoxFuture<'static, Result<Session, UpstreamError>>;
}

/// Point-in-time view of the resolved session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session: Option<Session>,
    pub error: Option<String>,
}

struct ResolverState {
    status: SessionStatus,
    session: Option<Session>,
    error: Option<String>,
    /// Credential the state above refers to.
    current: Option<String>,
    /// Credential with an outstanding fetch, if any.
    inflight: Option<String>,
}

struct ResolverInner {
    fetcher: Arc<dyn ProfileFetcher>,
    state: Mutex<ResolverState>,
    changed: Notify,
}

/// Observes a [`CredentialStore`] and resolves the session for its
/// current credential.
pub struct SessionResolver {
    inner: Arc<ResolverInner>,
    subscription: Subscription,
}

impl SessionResolver {
    /// Subscribe to the store and start resolving. If the store already
    /// holds a credential, exactly one fetch is issued for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: &CredentialStore, fetcher: Arc<dyn ProfileFetcher>) -> Self {
        let inner = Arc::new(ResolverInner {
            fetcher,
            state: Mutex::new(ResolverState {
                status: SessionStatus::Idle,
                session: None,
                error: None,
                current: None,
                inflight: None,
            }),
            changed: Notify::new(),
        });

        let observer = inner.clone();
        let subscription = store.subscribe(move |credential| {
            observer
                .clone()
                .handle_change(credential.map(str::to_string));
        });

        if let Some(initial) = store.get() {
            inner.clone().handle_change(Some(initial));
        }

        Self {
            inner,
            subscription,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.lock().expect("resolver lock poisoned");
        SessionSnapshot {
            status: state.status,
            session: state.session.clone(),
            error: state.error.clone(),
        }
    }

    /// Wait until the session is no longer loading and return the
    /// settled snapshot.
    pub async fn settled(&self) -> SessionSnapshot {
        loop {
            let notified = self.inner.changed.notified();
            let snapshot = self.snapshot();
            if snapshot.status != SessionStatus::Loading {
                return snapshot;
            }
            notified.await;
        }
    }
}

impl Drop for SessionResolver {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}

impl ResolverInner {
    /// Runs synchronously inside the store notification, so observers
    /// see the transition as soon as `set`/`clear` returns. At most one
    /// fetch per credential value is outstanding at a time.
    fn handle_change(self: Arc<Self>, change: Option<String>) {
        let mut state = self.state.lock().expect("resolver lock poisoned");
        match change {
            None => {
                // Credential cleared: reset synchronously. An in-flight
                // fetch is left to finish; its result is discarded on
                // completion because `current` no longer matches.
                state.status = SessionStatus::Idle;
                state.session = None;
                state.error = None;
                state.current = None;
                drop(state);
            }
            Some(credential) => {
                state.current = Some(credential.clone());
                state.status = SessionStatus::Loading;
                state.error = None;

                if state.inflight.as_deref() == Some(credential.as_str()) {
                    // A fetch for this exact credential is already out.
                    drop(state);
                    self.changed.notify_waiters();
                    return;
                }
                state.inflight = Some(credential.clone());
                drop(state);

                let inner = self.clone();
                tokio::spawn(async move {
                    let result = inner.fetcher.fetch_profile(credential.clone()).await;
                    inner.apply(credential, result);
                });
            }
        }
        self.changed.notify_waiters();
    }

    fn apply(&self, credential: String, result: Result<Session, UpstreamError>) {
        let mut state = self.state.lock().expect("resolver lock poisoned");
        if state.inflight.as_deref() == Some(credential.as_str()) {
            state.inflight = None;
        }
        if state.current.as_deref() != Some(credential.as_str()) {
            // Superseded: the store moved on while this fetch was out.
            tracing::debug!("Discarding stale profile fetch result");
            drop(state);
            self.changed.notify_waiters();
            return;
        }
        match result {
            Ok(session) => {
                tracing::debug!(user_id = session.user_id, "Session resolved");
                state.status = SessionStatus::Resolved;
                state.session = Some(session);
                state.error = None;
            }
            Err(err) => {
                // The credential is left untouched: whether to clear it
                // is the consumer's decision, not the resolver's.
                tracing::warn!(error = %err, "Profile fetch failed");
                state.status = SessionStatus::Error;
                state.session = None;
                state.error = Some(err.to_string());
            }
        }
        drop(state);
        self.changed.notify_waiters();
    }
}
