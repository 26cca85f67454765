//! Per-state hook records.

use super::session::Session;
use crate::core::State;

/// A hook run against the session and the chart's collaborators.
pub type Hook<S, C> = Box<dyn Fn(&mut Session<S>, &mut C) + Send + Sync>;

/// Which hook of a state to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Entry,
    Logic,
    Exit,
}

/// The `{entry, logic, exit}` record of one state. Every hook is optional.
pub struct StateHooks<S: State, C> {
    entry: Option<Hook<S, C>>,
    logic: Option<Hook<S, C>>,
    exit: Option<Hook<S, C>>,
}

impl<S: State, C> StateHooks<S, C> {
    pub fn new() -> Self {
        Self {
            entry: None,
            logic: None,
            exit: None,
        }
    }

    /// Runs once when the state becomes current.
    pub fn on_entry<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Session<S>, &mut C) + Send + Sync + 'static,
    {
        self.entry = Some(Box::new(f));
        self
    }

    /// Runs on every tick while the state is current.
    pub fn on_logic<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Session<S>, &mut C) + Send + Sync + 'static,
    {
        self.logic = Some(Box::new(f));
        self
    }

    /// Runs once when the state is left.
    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Session<S>, &mut C) + Send + Sync + 'static,
    {
        self.exit = Some(Box::new(f));
        self
    }

    pub fn get(&self, kind: HookKind) -> Option<&Hook<S, C>> {
        match kind {
            HookKind::Entry => self.entry.as_ref(),
            HookKind::Logic => self.logic.as_ref(),
            HookKind::Exit => self.exit.as_ref(),
        }
    }
}

impl<S: State, C> Default for StateHooks<S, C> {
    fn default() -> Self {
        Self::new()
    }
}
