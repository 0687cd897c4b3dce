// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory bearer credential store.
//!
//! Holds the single current credential for one session and notifies
//! subscribers of every change. This is plain process-local state with
//! the lifetime of the owning session engine; there is no persistence
//! and no I/O. The store is an explicit, constructible value passed by
//! reference to its consumers, never an ambient global.

use std::sync::{Arc, Mutex, RwLock, Weak};

type Listener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

struct ListenerTable {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Holds the current bearer credential and a subscriber list.
///
/// Guarantees:
/// - `set`/`clear` update the held value before any subscriber runs, so
///   a subscriber reading the store always observes the new value;
/// - subscribers are notified in subscription order, and one `set` or
///   `clear` finishes notifying before the next begins;
/// - every [`Subscription`] cancels independently and idempotently, and
///   cancelling after the store is gone is a no-op.
pub struct CredentialStore {
    value: RwLock<Option<String>>,
    // Also serializes notification dispatch across concurrent set/clear.
    listeners: Arc<Mutex<ListenerTable>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            value: RwLock::new(None),
            listeners: Arc::new(Mutex::new(ListenerTable {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Current credential, if any.
    pub fn get(&self) -> Option<String> {
        self.value.read().expect("credential lock poisoned").clone()
    }

    /// Replace the credential and notify subscribers.
    pub fn set(&self, credential: impl Into<String>) {
        self.replace(Some(credential.into()));
    }

    /// Drop the credential and notify subscribers.
    pub fn clear(&self) {
        self.replace(None);
    }

    /// Register a change listener. The listener is invoked synchronously
    /// from within `set`/`clear` with the new value.
    pub fn subscribe(&self, listener: impl Fn(Option<&str>) + Send + Sync + 'static) -> Subscription {
        let mut table = self.listeners.lock().expect("listener lock poisoned");
        let id = table.next_id;
        table.next_id += 1;
        table.entries.push((id, Arc::new(listener)));
        Subscription {
            table: Arc::downgrade(&self.listeners),
            id,
        }
    }

    fn replace(&self, credential: Option<String>) {
        // The listener lock is held across dispatch: concurrent set/clear
        // calls deliver their notifications strictly one after the other.
        let table = self.listeners.lock().expect("listener lock poisoned");
        {
            let mut value = self.value.write().expect("credential lock poisoned");
            *value = credential.clone();
        }
        for (_, listener) in &table.entries {
            listener(credential.as_deref());
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`CredentialStore::subscribe`].
///
/// Dropping the handle does NOT unsubscribe; call [`Subscription::cancel`].
/// The handle holds only a weak reference, so it never keeps a
/// torn-down store alive.
pub struct Subscription {
    table: Weak<Mutex<ListenerTable>>,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Safe to call more than once, and after the
    /// store has been dropped.
    pub fn cancel(&self) {
        if let Some(table) = self.table.upgrade() {
            let mut table = table.lock().expect("listener lock poisoned");
            table.entries.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_value_visible_before_notification() {
        let store = Arc::new(CredentialStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let store_ref = store.clone();
        let seen_ref = seen.clone();
        let _sub = store.subscribe(move |notified| {
            // The store must already hold what the notification carries.
            assert_eq!(store_ref.get().as_deref(), notified);
            seen_ref.lock().unwrap().push(notified.map(str::to_string));
        });

        store.set("t1");
        store.clear();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("t1".to_string()), None]
        );
    }

    #[test]
    fn test_subscribers_notified_in_subscription_order() {
        let store = CredentialStore::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        let _a = store.subscribe(move |_| o1.lock().unwrap().push("a"));
        let o2 = order.clone();
        let _b = store.subscribe(move |_| o2.lock().unwrap().push("b"));

        store.set("t1");
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let store = CredentialStore::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_ref = calls.clone();
        let sub = store.subscribe(move |_| {
            calls_ref.fetch_add(1, Ordering::SeqCst);
        });

        store.set("t1");
        sub.cancel();
        sub.cancel();
        store.set("t2");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_after_store_dropped_is_noop() {
        let store = CredentialStore::new();
        let sub = store.subscribe(|_| {});
        drop(store);
        sub.cancel();
    }
}
