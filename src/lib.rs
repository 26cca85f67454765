//! Parkgate: polling state charts for automated parking gates
//!
//! Each gate (entrance or exit) runs one chart. A chart is a closed set of
//! states, each with optional entry, logic and exit hooks, driven by a
//! fixed-rate tick:
//!
//! 1. apply the transition requested on the previous tick
//! 2. publish the status view if it changed
//! 3. heartbeat
//! 4. run the current state's logic hook
//! 5. execute at most one remote command
//!
//! Charts talk to the outside world only through a key/value
//! [`RemoteStore`](remote::RemoteStore) laid out as
//! `<gate>/<component>/{status, command, config, heartbeat}`, plus the
//! [`Ledger`](ledger::Ledger) of parking transactions.
//!
//! # Example
//!
//! ```rust
//! use parkgate::builder::ChartBuilder;
//! use parkgate::core::ManualClock;
//! use parkgate::engine::{Session, StateHooks};
//! use parkgate::remote::{Handler, MemoryStore};
//! use parkgate::state_enum;
//! use std::sync::Arc;
//!
//! state_enum! {
//!     enum Door {
//!         Closed => "closed",
//!         Open => "open",
//!     }
//! }
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut engine = ChartBuilder::<Door, ()>::new("door")
//!     .initial(Door::Closed)
//!     .state(Door::Closed, StateHooks::new())
//!     .state(Door::Open, StateHooks::new())
//!     .command("open", Handler::unit(|s: &mut Session<Door>| s.request_transition(Door::Open)))
//!     .build(store.clone(), Arc::new(ManualClock::new()))
//!     .unwrap();
//!
//! engine.start(&mut ());
//! engine.request_transition(Door::Open);
//! engine.tick(&mut ());
//! assert_eq!(engine.current_state(), Door::Open);
//! assert_eq!(store.value("door/state/status")["current_state"], "open");
//! ```

pub mod builder;
pub mod charts;
pub mod config;
pub mod controller;
pub mod core;
pub mod detector;
pub mod engine;
pub mod ledger;
pub mod notify;
pub mod remote;
pub mod runtime;

// Re-export commonly used types
pub use builder::{BuildError, ChartBuilder};
pub use charts::{EntranceChart, EntranceState, ExitChart, ExitState, GateEnv};
pub use config::GateConfig;
pub use crate::core::{Clock, State, StateHistory, StateTransition};
pub use engine::{Session, StateEngine, StateHooks};
