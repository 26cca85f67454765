//! The generic polling engine.
//!
//! A [`StateEngine`] owns the active [`Session`] of one chart and a table of
//! per-state [`StateHooks`]. Each call to [`StateEngine::tick`] runs, in
//! order:
//!
//! 1. a pending transition (exit hook, switch, publish, entry hook)
//! 2. a status publish if the exported view changed
//! 3. the liveness heartbeat when due
//! 4. the current state's logic hook
//! 5. at most one remote command
//!
//! Timeouts are never scheduled. Hooks compare [`Session::elapsed`] against a
//! threshold on every tick.

mod hooks;
mod machine;
mod session;

pub use hooks::{Hook, HookKind, StateHooks};
pub use machine::{StateEngine, TickReport};
pub use session::Session;
