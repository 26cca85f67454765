//! State transition history tracking.
//!
//! The engine keeps a bounded log of the transitions it performed so that
//! operators and tests can see the path a chart has taken.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Record of a single state transition.
///
/// # Example
///
/// ```rust
/// use parkgate::core::{State, StateTransition};
/// use serde::{Deserialize, Serialize};
/// use chrono::Utc;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Arm {
///     Down,
///     Up,
/// }
///
/// impl State for Arm {
///     const ALL: &'static [Self] = &[Self::Down, Self::Up];
///
///     fn name(&self) -> &str {
///         match self {
///             Self::Down => "down",
///             Self::Up => "up",
///         }
///     }
/// }
///
/// let transition = StateTransition {
///     from: Arm::Down,
///     to: Arm::Up,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.to, Arm::Up);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being transitioned from
    pub from: S,
    /// The state being transitioned to
    pub to: S,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of the most recent transitions.
///
/// Once `capacity` transitions are stored, recording a new one drops the
/// oldest.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    capacity: usize,
    transitions: VecDeque<StateTransition<S>>,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    /// Default number of transitions retained.
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            transitions: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a transition, evicting the oldest one when full.
    pub fn record(&mut self, transition: StateTransition<S>) {
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Get the path of states traversed.
    ///
    /// Returns the `from` state of the oldest retained transition, then the
    /// `to` state of each transition.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.front() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    pub fn last(&self) -> Option<&StateTransition<S>> {
        self.transitions.back()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &StateTransition<S>> {
        self.transitions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Detect,
        Process,
    }

    impl State for TestState {
        const ALL: &'static [Self] = &[Self::Idle, Self::Detect, Self::Process];

        fn name(&self) -> &str {
            match self {
                Self::Idle => "idle",
                Self::Detect => "detect",
                Self::Process => "process",
            }
        }
    }

    fn hop(from: TestState, to: TestState) -> StateTransition<TestState> {
        StateTransition {
            from,
            to,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<TestState> = StateHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let mut history = StateHistory::new();
        history.record(hop(TestState::Idle, TestState::Detect));
        history.record(hop(TestState::Detect, TestState::Process));

        let path = history.get_path();
        assert_eq!(
            path,
            vec![&TestState::Idle, &TestState::Detect, &TestState::Process]
        );
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut history = StateHistory::with_capacity(2);
        history.record(hop(TestState::Idle, TestState::Detect));
        history.record(hop(TestState::Detect, TestState::Process));
        history.record(hop(TestState::Process, TestState::Idle));

        assert_eq!(history.len(), 2);
        assert_eq!(history.get_path()[0], &TestState::Detect);
        assert_eq!(history.last().map(|t| t.to), Some(TestState::Idle));
    }

    #[test]
    fn zero_capacity_still_keeps_latest() {
        let mut history = StateHistory::with_capacity(0);
        history.record(hop(TestState::Idle, TestState::Detect));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn history_serializes_correctly() {
        let mut history = StateHistory::new();
        history.record(hop(TestState::Idle, TestState::Detect));

        let json = serde_json::to_string(&history).unwrap();
        let restored: StateHistory<TestState> = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.len(), 1);
    }
}
