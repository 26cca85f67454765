//! Builder for constructing chart engines.

use crate::builder::error::{BuildError, ChartViolation};
use crate::core::{Clock, State, StateHistory};
use crate::engine::{Session, StateEngine, StateHooks};
use crate::remote::{
    CommandChannel, CommandTable, Handler, Heartbeat, Namespace, RemoteStore, StatusPublisher,
};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<ChartViolation>>;

/// Remote component name under which every engine publishes.
pub const ENGINE_COMPONENT: &str = "state";

/// Builder for a [`StateEngine`] with a fluent API.
///
/// Every variant of `S` must receive a hook record, even an empty one, so a
/// chart can never reach a state it knows nothing about. All problems are
/// reported together by [`build`](Self::build).
pub struct ChartBuilder<S: State + 'static, C: 'static> {
    name: String,
    initial: Option<S>,
    states: Vec<(S, StateHooks<S, C>)>,
    commands: Vec<(String, Handler<Session<S>>)>,
    heartbeat: Duration,
    history_capacity: usize,
}

impl<S: State + 'static, C: 'static> ChartBuilder<S, C> {
    /// Create a builder for the chart published under `<name>/state`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: None,
            states: Vec::new(),
            commands: Vec::new(),
            heartbeat: Duration::seconds(Heartbeat::DEFAULT_INTERVAL_SECS),
            history_capacity: StateHistory::<S>::DEFAULT_CAPACITY,
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Register the hook record of one state.
    pub fn state(mut self, state: S, hooks: StateHooks<S, C>) -> Self {
        self.states.push((state, hooks));
        self
    }

    /// Register a remote command handler.
    pub fn command(mut self, verb: impl Into<String>, handler: Handler<Session<S>>) -> Self {
        self.commands.push((verb.into(), handler));
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Build the engine.
    ///
    /// Returns every violation at once when the definition is invalid.
    pub fn build(
        self,
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<StateEngine<S, C>, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;
        let mut checks: Vec<Check> = Vec::new();

        if self.name.trim().is_empty() {
            checks.push(Validation::fail(ChartViolation::EmptyName));
        }
        if self.heartbeat <= Duration::zero() {
            checks.push(Validation::fail(ChartViolation::NonPositiveHeartbeat));
        }

        let mut hooks = HashMap::new();
        for (state, record) in self.states {
            if hooks.insert(state, record).is_some() {
                checks.push(Validation::fail(ChartViolation::DuplicateState {
                    state: state.name().to_string(),
                }));
            }
        }
        for state in S::ALL {
            if !hooks.contains_key(state) {
                checks.push(Validation::fail(ChartViolation::UnregisteredState {
                    state: state.name().to_string(),
                }));
            }
        }

        let mut commands = CommandTable::new();
        for (verb, handler) in self.commands {
            if !valid_verb(&verb) {
                checks.push(Validation::fail(ChartViolation::InvalidVerb { verb }));
            } else if commands.contains(&verb) {
                checks.push(Validation::fail(ChartViolation::DuplicateVerb { verb }));
            } else {
                commands.insert(verb, handler);
            }
        }

        if let Validation::Failure(errors) = Validation::all_vec(checks) {
            return Err(BuildError::Invalid {
                chart: self.name,
                violations: errors.iter().cloned().collect(),
            });
        }

        let namespace = Namespace::new(&self.name, ENGINE_COMPONENT);
        Ok(StateEngine {
            initial,
            session: Session::new(initial, clock),
            hooks,
            commands,
            store,
            channel: CommandChannel::new(&namespace),
            status: StatusPublisher::new(namespace.status()),
            heartbeat: Heartbeat::new(namespace.heartbeat(), self.heartbeat),
            history: StateHistory::with_capacity(self.history_capacity),
            entry_pending: false,
            running: false,
            name: self.name,
        })
    }
}

fn valid_verb(verb: &str) -> bool {
    !verb.is_empty() && !verb.contains(':') && !verb.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SystemClock;
    use crate::remote::MemoryStore;
    use crate::state_enum;

    state_enum! {
        enum Door {
            Shut => "shut",
            Open => "open",
            Stuck => "stuck",
        }
    }

    fn deps() -> (Arc<dyn RemoteStore>, Arc<dyn Clock>) {
        (Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    #[test]
    fn builder_requires_initial_state() {
        let (store, clock) = deps();
        let result = ChartBuilder::<Door, ()>::new("door").build(store, clock);
        assert!(matches!(result, Err(BuildError::MissingInitialState)));
    }

    #[test]
    fn builder_accumulates_all_violations() {
        let (store, clock) = deps();
        let result = ChartBuilder::<Door, ()>::new("door")
            .initial(Door::Shut)
            .state(Door::Shut, StateHooks::new())
            .state(Door::Shut, StateHooks::new())
            .command("set idle", Handler::unit(|_| {}))
            .command("go", Handler::unit(|_| {}))
            .command("go", Handler::unit(|_| {}))
            .build(store, clock);

        let err = match result {
            Err(err) => err,
            Ok(_) => panic!("expected build failure"),
        };
        let violations = err.violations();
        assert_eq!(violations.len(), 5);
        assert!(violations.contains(&ChartViolation::DuplicateState {
            state: "shut".into()
        }));
        assert!(violations.contains(&ChartViolation::UnregisteredState {
            state: "open".into()
        }));
        assert!(violations.contains(&ChartViolation::UnregisteredState {
            state: "stuck".into()
        }));
        assert!(violations.contains(&ChartViolation::InvalidVerb {
            verb: "set idle".into()
        }));
        assert!(violations.contains(&ChartViolation::DuplicateVerb { verb: "go".into() }));
        assert!(err.to_string().contains("door"));
    }

    #[test]
    fn builder_rejects_empty_name_and_heartbeat() {
        let (store, clock) = deps();
        let result = ChartBuilder::<Door, ()>::new(" ")
            .initial(Door::Shut)
            .state(Door::Shut, StateHooks::new())
            .state(Door::Open, StateHooks::new())
            .state(Door::Stuck, StateHooks::new())
            .heartbeat_interval(Duration::zero())
            .build(store, clock);

        let err = result.err().expect("expected build failure");
        assert_eq!(
            err.violations(),
            &[ChartViolation::EmptyName, ChartViolation::NonPositiveHeartbeat]
        );
    }

    #[test]
    fn fluent_api_builds_engine() {
        let (store, clock) = deps();
        let engine = ChartBuilder::<Door, ()>::new("door")
            .initial(Door::Open)
            .state(Door::Shut, StateHooks::new())
            .state(Door::Open, StateHooks::new())
            .state(Door::Stuck, StateHooks::new())
            .command("set_idle", Handler::unit(|s: &mut Session<Door>| {
                s.request_transition(Door::Shut)
            }))
            .history_capacity(8)
            .build(store, clock)
            .unwrap();

        assert_eq!(engine.name(), "door");
        assert_eq!(engine.current_state(), Door::Open);
        assert!(!engine.is_running());
    }
}
