//! Mutable per-instance state handed to hooks and command handlers.

use crate::core::{Clock, Info, State, StateSnapshot};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;

/// The active snapshot plus the pending transition request.
///
/// Hooks never switch state directly. They call
/// [`request_transition`](Self::request_transition), and the engine honors the
/// request at the start of the next tick.
pub struct Session<S: State> {
    snapshot: StateSnapshot<S>,
    next: Option<S>,
    hold_until: Option<DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl<S: State> Session<S> {
    pub fn new(initial: S, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            snapshot: StateSnapshot::new(initial, now),
            next: None,
            hold_until: None,
            clock,
        }
    }

    pub fn current(&self) -> S {
        self.snapshot.name
    }

    pub fn previous(&self) -> Option<S> {
        self.snapshot.previous
    }

    pub fn next(&self) -> Option<S> {
        self.next
    }

    pub fn snapshot(&self) -> &StateSnapshot<S> {
        &self.snapshot
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn entered_at(&self) -> DateTime<Utc> {
        self.snapshot.entered_at
    }

    /// Wall-clock time spent in the current state.
    pub fn elapsed(&self) -> Duration {
        self.now() - self.snapshot.entered_at
    }

    pub fn has_elapsed(&self, threshold: Duration) -> bool {
        self.elapsed() >= threshold
    }

    /// Ask the engine to move to `to` on the next tick.
    ///
    /// A later request in the same tick overwrites an earlier one.
    pub fn request_transition(&mut self, to: S) {
        self.next = Some(to);
    }

    /// Keep the engine from running transitions and hooks for `duration`.
    pub fn hold(&mut self, duration: Duration) {
        let until = self.now() + duration;
        self.hold_until = Some(self.hold_until.map_or(until, |held| held.max(until)));
    }

    pub fn is_held(&self) -> bool {
        self.hold_until.is_some_and(|until| self.now() < until)
    }

    pub fn info(&self) -> &Info {
        &self.snapshot.info
    }

    pub fn info_mut(&mut self) -> &mut Info {
        &mut self.snapshot.info
    }

    /// Replace `info` wholesale. Non-object values clear it.
    pub fn replace_info(&mut self, value: Value) {
        self.snapshot.info = match value {
            Value::Object(map) => map,
            _ => Info::new(),
        };
    }

    pub fn clear_info(&mut self) {
        self.snapshot.info.clear();
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.snapshot.info.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.snapshot.info.remove(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.snapshot.info.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.snapshot.info.get(key).and_then(Value::as_bool)
    }

    pub fn set_time(&mut self, key: &str, at: DateTime<Utc>) {
        self.set(key, at.to_rfc3339());
    }

    pub fn get_time(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.get_str(key)?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    /// Strings stored under `key`, ignoring non-string entries.
    pub fn get_strings(&self, key: &str) -> Vec<String> {
        self.snapshot
            .info
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn status_view(&self) -> Value {
        self.snapshot.status_view(self.next)
    }

    pub(crate) fn reset(&mut self, initial: S) {
        let now = self.now();
        self.snapshot = StateSnapshot::new(initial, now);
        self.next = None;
        self.hold_until = None;
    }

    /// Take the pending request unless it names the current state.
    pub(crate) fn take_next(&mut self) -> Option<S> {
        self.next.take().filter(|next| *next != self.snapshot.name)
    }

    pub(crate) fn enter(&mut self, to: S) {
        self.snapshot.previous = Some(self.snapshot.name);
        self.snapshot.name = to;
        self.snapshot.entered_at = self.now();
    }

    pub(crate) fn restart_timer(&mut self) {
        self.snapshot.entered_at = self.now();
    }
}
