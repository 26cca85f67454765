//! The polling state engine.

use super::hooks::{HookKind, StateHooks};
use super::session::Session;
use crate::core::{State, StateHistory, StateSnapshot, StateTransition};
use crate::remote::{CommandChannel, CommandTable, Dispatch, Heartbeat, RemoteStore, StatusPublisher};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport<S: State> {
    /// `(from, to)` when a transition ran at the start of the tick.
    pub transition: Option<(S, S)>,
    /// A deferred entry hook ran this tick.
    pub deferred_entry: bool,
    /// The transition landed in an error state.
    pub entered_error: bool,
    pub published: bool,
    pub heartbeat: bool,
    pub logic_ran: bool,
    pub command: Dispatch,
    pub stopped: bool,
}

impl<S: State> Default for TickReport<S> {
    fn default() -> Self {
        Self {
            transition: None,
            deferred_entry: false,
            entered_error: false,
            published: false,
            heartbeat: false,
            logic_ran: false,
            command: Dispatch::Idle,
            stopped: false,
        }
    }
}

/// Drives one chart: transition, publish, heartbeat, logic, command.
///
/// Built with [`ChartBuilder`](crate::builder::ChartBuilder), which guarantees
/// every state has a hook record.
pub struct StateEngine<S: State + 'static, C: 'static> {
    pub(crate) name: String,
    pub(crate) initial: S,
    pub(crate) session: Session<S>,
    pub(crate) hooks: HashMap<S, StateHooks<S, C>>,
    pub(crate) commands: CommandTable<Session<S>>,
    pub(crate) store: Arc<dyn RemoteStore>,
    pub(crate) channel: CommandChannel,
    pub(crate) status: StatusPublisher,
    pub(crate) heartbeat: Heartbeat,
    pub(crate) history: StateHistory<S>,
    pub(crate) entry_pending: bool,
    pub(crate) running: bool,
}

impl<S: State + 'static, C: 'static> StateEngine<S, C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_state(&self) -> S {
        self.session.current()
    }

    pub fn previous_state(&self) -> Option<S> {
        self.session.previous()
    }

    pub fn next_state(&self) -> Option<S> {
        self.session.next()
    }

    pub fn snapshot(&self) -> &StateSnapshot<S> {
        self.session.snapshot()
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<S> {
        &mut self.session
    }

    pub fn history(&self) -> &StateHistory<S> {
        &self.history
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether an entry hook is waiting for a hold to expire.
    pub fn entry_pending(&self) -> bool {
        self.entry_pending
    }

    /// Request a transition, honored at the start of the next tick.
    pub fn request_transition(&mut self, to: S) {
        self.session.request_transition(to);
    }

    /// Enter the initial state and announce it remotely.
    pub fn start(&mut self, env: &mut C) {
        if self.running {
            warn!(chart = %self.name, "State engine is already running");
            return;
        }
        info!(chart = %self.name, initial = self.initial.name(), "State engine starting");
        self.session.reset(self.initial);
        self.entry_pending = false;
        self.running = true;

        let store = Arc::clone(&self.store);
        self.status.publish(&*store, &self.session.status_view());
        self.heartbeat.force(&*store, self.session.now());
        self.channel.clear(&*store);
        self.run_hook(HookKind::Entry, env);
    }

    /// Stop ticking. A hook already executing has finished by the time this
    /// can be called, since ticks are sequential.
    pub fn stop(&mut self) {
        if self.running {
            info!(chart = %self.name, state = self.session.current().name(), "State engine stopping");
            self.running = false;
        }
    }

    /// Run one tick.
    pub fn tick(&mut self, env: &mut C) -> TickReport<S> {
        if !self.running {
            return TickReport {
                stopped: true,
                ..TickReport::default()
            };
        }
        let store = Arc::clone(&self.store);
        let mut report = TickReport::default();

        // 1. Transition, unless a hook placed the session on hold.
        if !self.session.is_held() {
            if self.entry_pending {
                self.entry_pending = false;
                self.session.restart_timer();
                debug!(chart = %self.name, state = self.session.current().name(), "Running deferred entry");
                report.published = self.status.publish(&*store, &self.session.status_view());
                self.run_hook(HookKind::Entry, env);
                report.deferred_entry = true;
            } else if let Some(next) = self.session.take_next() {
                let from = self.session.current();
                info!(chart = %self.name, from = from.name(), to = next.name(), "State transition");
                self.run_hook(HookKind::Exit, env);
                self.session.enter(next);
                self.history.record(StateTransition {
                    from,
                    to: next,
                    timestamp: self.session.entered_at(),
                });
                if next.is_error() {
                    warn!(
                        chart = %self.name,
                        state = next.name(),
                        reason = self.session.get_str("reason").unwrap_or_default(),
                        "Entered error state"
                    );
                    report.entered_error = true;
                }
                report.published = self.status.publish(&*store, &self.session.status_view());
                if self.session.is_held() {
                    debug!(chart = %self.name, state = next.name(), "Entry deferred by hold");
                    self.entry_pending = true;
                } else {
                    self.run_hook(HookKind::Entry, env);
                }
                report.transition = Some((from, next));
            }
        }

        // 2. Diff publish.
        if report.transition.is_none() && !report.deferred_entry {
            report.published = self
                .status
                .publish_if_changed(&*store, &self.session.status_view());
        }

        // 3. Heartbeat.
        report.heartbeat = self.heartbeat.beat(&*store, self.session.now());

        // 4. Logic.
        if !self.entry_pending && !self.session.is_held() {
            report.logic_ran = self.run_hook(HookKind::Logic, env);
        }

        // 5. One pending remote command. A command arriving during a hold
        // stays in its slot until the deferred entry has run.
        if !self.entry_pending && !self.session.is_held() {
            report.command = self
                .channel
                .poll(&*store, &self.commands, &mut self.session);
        }

        report
    }

    fn run_hook(&mut self, kind: HookKind, env: &mut C) -> bool {
        let state = self.session.current();
        let Some(hook) = self.hooks.get(&state).and_then(|hooks| hooks.get(kind)) else {
            return false;
        };
        trace!(chart = %self.name, state = state.name(), hook = ?kind, "Running hook");
        hook(&mut self.session, env);
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::ChartBuilder;
    use crate::core::{Clock, ManualClock};
    use crate::engine::{Session, StateEngine, StateHooks};
    use crate::remote::{Dispatch, Handler, MemoryStore, RemoteStore};
    use crate::state_enum;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    state_enum! {
        enum Light {
            Off => "off",
            On => "on",
            Cooling => "cooling",
        }
    }

    #[derive(Default)]
    struct Env {
        entries: Vec<&'static str>,
        exits: Vec<&'static str>,
        logic_runs: usize,
    }

    fn engine(store: Arc<MemoryStore>, clock: &ManualClock) -> StateEngine<Light, Env> {
        ChartBuilder::new("lamp")
            .initial(Light::Off)
            .state(
                Light::Off,
                StateHooks::new()
                    .on_entry(|s, env: &mut Env| {
                        env.entries.push("off");
                        s.clear_info();
                    })
                    .on_logic(|_, env: &mut Env| env.logic_runs += 1),
            )
            .state(
                Light::On,
                StateHooks::new()
                    .on_entry(|s, env: &mut Env| {
                        env.entries.push("on");
                        s.set("lit", true);
                    })
                    .on_exit(|s, env: &mut Env| {
                        env.exits.push("on");
                        s.hold(Duration::seconds(5));
                    }),
            )
            .state(Light::Cooling, StateHooks::new())
            .command(
                "off",
                Handler::unit(|s: &mut Session<Light>| s.request_transition(Light::Off)),
            )
            .command(
                "switch",
                Handler::arg(|s: &mut Session<Light>, arg: &str| {
                    if let Some(state) = <Light as crate::core::State>::from_name(arg) {
                        s.request_transition(state);
                    }
                }),
            )
            .build(store, Arc::new(clock.clone()))
            .unwrap()
    }

    fn started() -> (StateEngine<Light, Env>, Env, Arc<MemoryStore>, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new();
        let mut engine = engine(Arc::clone(&store), &clock);
        let mut env = Env::default();
        engine.start(&mut env);
        (engine, env, store, clock)
    }

    #[test]
    fn start_publishes_status_and_runs_initial_entry() {
        let (engine, env, store, _) = started();

        assert!(engine.is_running());
        assert_eq!(env.entries, vec!["off"]);
        assert_eq!(store.value("lamp/state/status")["current_state"], "off");
        assert!(store.value("lamp/state/heartbeat").is_string());
        assert_eq!(store.value("lamp/state/command"), json!(""));
    }

    #[test]
    fn request_takes_effect_on_next_tick_only() {
        let (mut engine, mut env, _, _) = started();

        engine.request_transition(Light::On);
        assert_eq!(engine.current_state(), Light::Off);

        let report = engine.tick(&mut env);
        assert_eq!(report.transition, Some((Light::Off, Light::On)));
        assert_eq!(engine.current_state(), Light::On);
        assert_eq!(engine.previous_state(), Some(Light::Off));
        assert_eq!(env.entries, vec!["off", "on"]);
    }

    #[test]
    fn logic_requests_wait_for_following_tick() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new();
        let mut engine: StateEngine<Light, Env> = ChartBuilder::new("lamp")
            .initial(Light::Off)
            .state(
                Light::Off,
                StateHooks::new().on_logic(|s, _| s.request_transition(Light::Cooling)),
            )
            .state(Light::On, StateHooks::new())
            .state(Light::Cooling, StateHooks::new())
            .build(store.clone(), Arc::new(clock.clone()))
            .unwrap();
        let mut env = Env::default();
        engine.start(&mut env);

        let first = engine.tick(&mut env);
        assert!(first.transition.is_none());
        assert_eq!(engine.current_state(), Light::Off);
        assert_eq!(engine.next_state(), Some(Light::Cooling));

        let second = engine.tick(&mut env);
        assert_eq!(second.transition, Some((Light::Off, Light::Cooling)));
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn diff_publish_picks_up_info_changes() {
        let (mut engine, mut env, store, _) = started();
        engine.request_transition(Light::On);
        engine.tick(&mut env);
        // Published before the entry hook set `lit`.
        assert!(store.value("lamp/state/status").get("info").is_none());

        let report = engine.tick(&mut env);
        assert!(report.published);
        assert_eq!(store.value("lamp/state/status")["info"]["lit"], true);

        let report = engine.tick(&mut env);
        assert!(!report.published);
    }

    #[test]
    fn heartbeat_every_five_seconds() {
        let (mut engine, mut env, _, clock) = started();

        assert!(!engine.tick(&mut env).heartbeat);
        clock.advance_secs(5);
        assert!(engine.tick(&mut env).heartbeat);
        clock.advance_secs(2);
        assert!(!engine.tick(&mut env).heartbeat);
    }

    #[test]
    fn exit_hold_defers_entry_and_logic() {
        let (mut engine, mut env, _, clock) = started();
        engine.request_transition(Light::On);
        engine.tick(&mut env);

        engine.request_transition(Light::Off);
        let report = engine.tick(&mut env);
        assert_eq!(report.transition, Some((Light::On, Light::Off)));
        assert_eq!(env.exits, vec!["on"]);
        assert!(engine.entry_pending());
        assert_eq!(env.entries, vec!["off", "on"]);
        assert!(!report.logic_ran);

        clock.advance_secs(4);
        engine.request_transition(Light::On);
        let report = engine.tick(&mut env);
        assert!(report.transition.is_none());
        assert!(!report.logic_ran);
        assert_eq!(engine.current_state(), Light::Off);

        clock.advance_secs(1);
        let report = engine.tick(&mut env);
        assert!(report.deferred_entry);
        assert_eq!(env.entries, vec!["off", "on", "off"]);
        assert!(report.logic_ran);
    }

    #[test]
    fn command_waits_in_slot_until_deferred_entry_ran() {
        let (mut engine, mut env, store, clock) = started();
        engine.request_transition(Light::On);
        engine.tick(&mut env);
        engine.request_transition(Light::Off);
        engine.tick(&mut env);
        assert!(engine.entry_pending());

        store.set("lamp/state/command", json!("switch:cooling")).unwrap();
        let report = engine.tick(&mut env);
        assert_eq!(report.command, Dispatch::Idle);
        assert_eq!(store.value("lamp/state/command"), json!("switch:cooling"));
        assert_eq!(engine.next_state(), None);

        clock.advance_secs(5);
        let report = engine.tick(&mut env);
        assert!(report.deferred_entry);
        assert!(matches!(report.command, Dispatch::Executed(_)));
        assert_eq!(store.value("lamp/state/command"), json!(""));

        engine.tick(&mut env);
        assert_eq!(engine.current_state(), Light::Cooling);
        assert_eq!(env.entries, vec!["off", "on", "off"]);
    }

    #[test]
    fn entering_error_state_is_reported() {
        state_enum! {
            enum Valve {
                Shut => "shut",
                Stuck => "stuck",
            }
            error: [Stuck]
        }

        let store = Arc::new(MemoryStore::new());
        let mut engine: StateEngine<Valve, ()> = ChartBuilder::new("valve")
            .initial(Valve::Shut)
            .state(
                Valve::Shut,
                StateHooks::new().on_logic(|s: &mut Session<Valve>, _: &mut ()| {
                    s.set("reason", "pressure");
                    s.request_transition(Valve::Stuck);
                }),
            )
            .state(Valve::Stuck, StateHooks::new())
            .build(store, Arc::new(ManualClock::new()))
            .unwrap();
        engine.start(&mut ());

        assert!(!engine.tick(&mut ()).entered_error);
        let report = engine.tick(&mut ());
        assert_eq!(report.transition, Some((Valve::Shut, Valve::Stuck)));
        assert!(report.entered_error);
    }

    #[test]
    fn commands_dispatch_and_clear() {
        let (mut engine, mut env, store, _) = started();
        store.set("lamp/state/command", json!("switch:on")).unwrap();

        let report = engine.tick(&mut env);
        assert!(matches!(report.command, Dispatch::Executed(_)));
        assert_eq!(store.value("lamp/state/command"), json!(""));
        assert_eq!(engine.next_state(), Some(Light::On));

        engine.tick(&mut env);
        assert_eq!(engine.current_state(), Light::On);
    }

    #[test]
    fn unmatched_command_changes_nothing() {
        let (mut engine, mut env, store, _) = started();
        store.set("lamp/state/command", json!("explode")).unwrap();

        let report = engine.tick(&mut env);
        assert!(matches!(report.command, Dispatch::Unmatched(_)));
        assert_eq!(store.value("lamp/state/command"), json!(""));
        assert_eq!(engine.next_state(), None);
    }

    #[test]
    fn state_without_logic_just_waits() {
        let (mut engine, mut env, store, _) = started();
        engine.request_transition(Light::Cooling);
        engine.tick(&mut env);

        let report = engine.tick(&mut env);
        assert!(!report.logic_ran);
        assert_eq!(engine.current_state(), Light::Cooling);

        store.set("lamp/state/command", json!("off")).unwrap();
        engine.tick(&mut env);
        engine.tick(&mut env);
        assert_eq!(engine.current_state(), Light::Off);
    }

    #[test]
    fn stopped_engine_ignores_ticks() {
        let (mut engine, mut env, _, _) = started();
        engine.stop();
        engine.request_transition(Light::On);

        let report = engine.tick(&mut env);
        assert!(report.stopped);
        assert_eq!(engine.current_state(), Light::Off);
    }

    #[test]
    fn request_for_current_state_is_discarded() {
        let (mut engine, mut env, store, _) = started();
        engine.request_transition(Light::Off);
        let report = engine.tick(&mut env);

        assert!(report.transition.is_none());
        assert_eq!(engine.next_state(), None);
        assert_eq!(store.value("lamp/state/status")["next_state"], "");
    }

    #[test]
    fn clock_is_shared_with_session() {
        let (engine, _, _, clock) = started();
        assert_eq!(engine.session().now(), clock.now());
    }
}
