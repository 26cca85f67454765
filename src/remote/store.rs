//! Remote key/value store abstraction.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors surfaced by a remote store transport.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote write rejected at '{path}': {reason}")]
    Rejected { path: String, reason: String },
}

/// Shared key/value store used for monitoring and override.
///
/// Paths are `/`-separated. Implementations must be cheap to call from a
/// tick; a slow transport should cache and write behind.
pub trait RemoteStore: Send + Sync {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;
}

/// A write observed on a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub path: String,
    pub value: Value,
}

/// In-process store with change notification.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<Change>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            entries: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Receive every write made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    /// Read a path, treating a missing entry as `Null`.
    pub fn value(&self, path: &str) -> Value {
        self.lock().get(path).cloned().unwrap_or(Value::Null)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock().get(path).cloned())
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.lock().insert(path.to_string(), value.clone());
        // No subscribers is fine.
        let _ = self.changes.send(Change {
            path: path.to_string(),
            value,
        });
        Ok(())
    }
}

/// Path prefix for one component of one gate, e.g. `entrance/state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(gate: &str, component: &str) -> Self {
        Self(format!("{gate}/{component}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn child(&self, key: &str) -> String {
        format!("{}/{key}", self.0)
    }

    pub fn status(&self) -> String {
        self.child("status")
    }

    pub fn command(&self) -> String {
        self.child("command")
    }

    pub fn config(&self) -> String {
        self.child("config")
    }

    pub fn heartbeat(&self) -> String {
        self.child("heartbeat")
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_round_trips_values() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a/b").unwrap(), None);

        store.set("a/b", json!({"x": 1})).unwrap();

        assert_eq!(store.get("a/b").unwrap(), Some(json!({"x": 1})));
        assert_eq!(store.value("missing"), Value::Null);
    }

    #[test]
    fn subscribers_see_writes() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();

        store.set("exit/state/command", json!("set_idle")).unwrap();

        let change = changes.try_recv().unwrap();
        assert_eq!(change.path, "exit/state/command");
        assert_eq!(change.value, json!("set_idle"));
    }

    #[test]
    fn namespace_builds_child_paths() {
        let ns = Namespace::new("entrance", "controller");
        assert_eq!(ns.status(), "entrance/controller/status");
        assert_eq!(ns.command(), "entrance/controller/command");
        assert_eq!(ns.config(), "entrance/controller/config");
        assert_eq!(ns.heartbeat(), "entrance/controller/heartbeat");
        assert_eq!(ns.to_string(), "entrance/controller");
    }
}
