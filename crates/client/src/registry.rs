//! Background Operation Registry
//!
//! Process-wide keyed store of live and failed operations, decoupled from
//! any single view's lifetime. A view that navigated away and back reads a
//! snapshot for its key and re-attaches to the same run; listeners are
//! notified on every mutation.
//!
//! Each key is written only by the state machine instance that owns it, so
//! a plain mutex-guarded map with an observer list is sufficient.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time view of one operation, as rendered by UI views.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationSnapshot {
    /// Stable identifier of the job kind; at most one live operation per key.
    pub key: String,
    /// Human-readable name.
    pub label: String,
    /// Last status string seen from the server.
    pub phase_name: Option<String>,
    /// Displayed progress, 0 to 100, non-decreasing while running.
    pub progress: f32,
    pub is_complete: bool,
    pub error: Option<String>,
    /// Used only for elapsed-time display.
    pub started_at: DateTime<Utc>,
}

impl OperationSnapshot {
    /// Rounded progress for display.
    pub fn percent(&self) -> u8 {
        self.progress.round().clamp(0.0, 100.0) as u8
    }

    /// Whether the operation is still running (no terminal marker set).
    pub fn is_live(&self) -> bool {
        !self.is_complete && self.error.is_none()
    }
}

/// Handle returned by [`OperationRegistry::subscribe`].
pub type SubscriptionId = u64;

type Listener = Box<dyn Fn(&str, Option<&OperationSnapshot>) + Send + Sync>;

/// Process-wide, keyed, subscribable operation store.
///
/// Clones share the same underlying store. Created once at process start and
/// never torn down; entries come and go per job key.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    entries: Mutex<HashMap<String, OperationSnapshot>>,
    listeners: Mutex<HashMap<SubscriptionId, Listener>>,
    next_subscription: AtomicU64,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `snapshot.key` and notify listeners.
    pub fn set(&self, snapshot: OperationSnapshot) {
        let key = snapshot.key.clone();
        {
            let mut entries = self.inner.entries.lock().expect("registry lock poisoned");
            entries.insert(key.clone(), snapshot.clone());
        }
        self.notify(&key, Some(&snapshot));
    }

    /// Read the entry for a key.
    pub fn get(&self, key: &str) -> Option<OperationSnapshot> {
        let entries = self.inner.entries.lock().expect("registry lock poisoned");
        entries.get(key).cloned()
    }

    /// Remove the entry for a key and notify listeners, if it existed.
    pub fn clear(&self, key: &str) {
        let removed = {
            let mut entries = self.inner.entries.lock().expect("registry lock poisoned");
            entries.remove(key)
        };
        if removed.is_some() {
            self.notify(key, None);
        }
    }

    /// All current entries, in no particular order.
    pub fn snapshot(&self) -> Vec<OperationSnapshot> {
        let entries = self.inner.entries.lock().expect("registry lock poisoned");
        entries.values().cloned().collect()
    }

    /// Register a listener invoked with `(key, Some(snapshot))` on set and
    /// `(key, None)` on clear.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&str, Option<&OperationSnapshot>) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.inner.listeners.lock().expect("registry lock poisoned");
        listeners.insert(id, Box::new(listener));
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut listeners = self.inner.listeners.lock().expect("registry lock poisoned");
        listeners.remove(&id);
    }

    fn notify(&self, key: &str, snapshot: Option<&OperationSnapshot>) {
        let listeners = self.inner.listeners.lock().expect("registry lock poisoned");
        for listener in listeners.values() {
            listener(key, snapshot);
        }
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.inner.entries.lock().expect("registry lock poisoned");
        f.debug_struct("OperationRegistry")
            .field("keys", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
