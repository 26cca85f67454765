//! Entrance and exit gate charts.
//!
//! A [`Chart`] pairs a [`StateEngine`] with the [`GateEnv`] its hooks act on.
//! Each tick first lets the collaborators catch up (detector drain,
//! controller status read) and then runs the engine.
//!
//! ```text
//! entrance: idle -> detect -> process -> success | failed -> idle
//! exit:     idle -> detect -> get -> success | payment -> idle | failed
//! ```

mod entrance;
mod exit;
mod shared;
#[cfg(test)]
mod testing;

pub use entrance::{EntranceChart, EntranceState};
pub use exit::{ExitChart, ExitState};
pub use shared::keys;

use crate::controller::{GateControl, SensorSnapshot};
use crate::core::{State, StateHistory};
use crate::detector::Detector;
use crate::engine::{StateEngine, TickReport};
use crate::ledger::Ledger;
use crate::notify::StaffNotifier;
use chrono::Duration;
use std::sync::Arc;

/// Every wall-clock threshold used by the charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Waiting in `detect` for the driver.
    pub detect: Duration,
    /// `failed` with nothing to wait for.
    pub failed: Duration,
    /// `failed` upper bound, whatever else happens.
    pub failed_max: Duration,
    /// Waiting in `payment` for settlement.
    pub payment: Duration,
    /// Time the car must be gone before the barricade closes.
    pub car_clear: Duration,
    /// Pause after `success` before the next state starts.
    pub cooldown: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            detect: Duration::seconds(30),
            failed: Duration::seconds(15),
            failed_max: Duration::seconds(120),
            payment: Duration::seconds(120),
            car_clear: Duration::seconds(5),
            cooldown: Duration::seconds(5),
        }
    }
}

/// Engine parameters shared by both charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub heartbeat: Duration,
    pub history_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            heartbeat: Duration::seconds(5),
            history_capacity: StateHistory::<EntranceState>::DEFAULT_CAPACITY,
        }
    }
}

/// Collaborators a gate chart's hooks act on.
pub struct GateEnv {
    pub detector: Detector,
    pub gate: Box<dyn GateControl>,
    pub ledger: Arc<dyn Ledger>,
    pub notifier: Arc<dyn StaffNotifier>,
    pub timeouts: Timeouts,
}

impl GateEnv {
    pub fn new(
        detector: Detector,
        gate: Box<dyn GateControl>,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn StaffNotifier>,
    ) -> Self {
        Self {
            detector,
            gate,
            ledger,
            notifier,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn sensors(&self) -> SensorSnapshot {
        self.gate.sensors()
    }

    /// Non-blocking refresh of detector and controller state.
    pub fn sync(&mut self) {
        self.detector.sync();
        self.gate.sync();
    }
}

/// One running gate: its engine and collaborators.
pub struct Chart<S: State + 'static> {
    engine: StateEngine<S, GateEnv>,
    env: GateEnv,
}

impl<S: State + 'static> Chart<S> {
    pub(crate) fn from_parts(engine: StateEngine<S, GateEnv>, env: GateEnv) -> Self {
        Self { engine, env }
    }

    pub fn name(&self) -> &str {
        self.engine.name()
    }

    pub fn state(&self) -> S {
        self.engine.current_state()
    }

    pub fn engine(&self) -> &StateEngine<S, GateEnv> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut StateEngine<S, GateEnv> {
        &mut self.engine
    }

    pub fn env(&self) -> &GateEnv {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut GateEnv {
        &mut self.env
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn start(&mut self) {
        self.env.detector.start();
        self.engine.start(&mut self.env);
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.env.detector.stop();
    }

    pub fn tick(&mut self) -> TickReport<S> {
        if self.engine.is_running() {
            self.env.sync();
        }
        self.engine.tick(&mut self.env)
    }
}
