//! Diff-based status publishing and liveness heartbeat.

use super::store::RemoteStore;
use crate::core::display;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{trace, warn};

/// Publishes a component's exported view to one path.
///
/// The comparison is made against whatever the store currently holds, which
/// is the last value known to have been echoed back.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    path: String,
}

impl StatusPublisher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Write unconditionally. Returns whether the write succeeded.
    pub fn publish(&self, store: &dyn RemoteStore, view: &Value) -> bool {
        match store.set(&self.path, view.clone()) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %self.path, error = %err, "Failed to publish status");
                false
            }
        }
    }

    /// Write only when `view` differs field by field from the stored value.
    pub fn publish_if_changed(&self, store: &dyn RemoteStore, view: &Value) -> bool {
        let echoed = match store.get(&self.path) {
            Ok(echoed) => echoed,
            Err(err) => {
                warn!(path = %self.path, error = %err, "Failed to read published status");
                None
            }
        };
        if echoed.as_ref() == Some(view) {
            return false;
        }
        trace!(path = %self.path, "Status changed, publishing");
        self.publish(store, view)
    }
}

/// Liveness timestamp refreshed at a fixed cadence.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    path: String,
    interval: Duration,
    last: Option<DateTime<Utc>>,
}

impl Heartbeat {
    pub const DEFAULT_INTERVAL_SECS: i64 = 5;

    pub fn new(path: impl Into<String>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            last: None,
        }
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }

    /// Write the heartbeat if none was written yet or `interval` has passed.
    pub fn beat(&mut self, store: &dyn RemoteStore, now: DateTime<Utc>) -> bool {
        let due = self.last.map_or(true, |last| now - last >= self.interval);
        if !due {
            return false;
        }
        self.force(store, now)
    }

    /// Write the heartbeat regardless of cadence.
    pub fn force(&mut self, store: &dyn RemoteStore, now: DateTime<Utc>) -> bool {
        self.last = Some(now);
        match store.set(&self.path, Value::String(display(now))) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %self.path, error = %err, "Failed to write heartbeat");
                false
            }
        }
    }
}
