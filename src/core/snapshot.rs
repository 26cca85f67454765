//! The active state of one chart instance.

use super::clock::display;
use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Free-form per-visit record owned by the active state.
pub type Info = Map<String, Value>;

/// Exactly one snapshot is active per chart instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateSnapshot<S: State> {
    pub name: S,
    pub previous: Option<S>,
    pub entered_at: DateTime<Utc>,
    pub info: Info,
}

impl<S: State> StateSnapshot<S> {
    pub fn new(name: S, entered_at: DateTime<Utc>) -> Self {
        Self {
            name,
            previous: None,
            entered_at,
            info: Info::new(),
        }
    }

    /// Status view written to the remote store.
    ///
    /// `info` is left out while empty.
    pub fn status_view(&self, next: Option<S>) -> Value {
        let mut view = json!({
            "current_state": self.name.name(),
            "prev_state": self.previous.as_ref().map(State::name).unwrap_or(""),
            "next_state": next.as_ref().map(State::name).unwrap_or(""),
            "enter_timestamp": display(self.entered_at),
        });
        if !self.info.is_empty() {
            view["info"] = Value::Object(self.info.clone());
        }
        view
    }
}
