//! Test doubles for chart tests.

use super::{Chart, EngineSettings, GateEnv, Timeouts};
use crate::builder::BuildError;
use crate::controller::{GateControl, SensorSnapshot};
use crate::core::{Clock, ManualClock, State};
use crate::detector::{Detector, PlateSender};
use crate::ledger::MemoryLedger;
use crate::notify::{Direction, NotifyError, StaffNotifier};
use crate::remote::{MemoryStore, RemoteStore};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Gate {
    sensors: SensorSnapshot,
    calls: Vec<&'static str>,
}

/// Gate whose sensors are set by the test.
#[derive(Clone, Default)]
pub(crate) struct FakeGate(Arc<Mutex<Gate>>);

impl FakeGate {
    pub(crate) fn set(&self, f: impl FnOnce(&mut SensorSnapshot)) {
        f(&mut self.0.lock().unwrap().sensors);
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().calls.clone()
    }
}

impl GateControl for FakeGate {
    fn open_barricade(&mut self) {
        let mut gate = self.0.lock().unwrap();
        gate.calls.push("open");
        gate.sensors.barricade_open = true;
    }

    fn close_barricade(&mut self) {
        let mut gate = self.0.lock().unwrap();
        gate.calls.push("close");
        gate.sensors.barricade_open = false;
    }

    fn sensors(&self) -> SensorSnapshot {
        self.0.lock().unwrap().sensors
    }

    fn set_hover_distance(&mut self, _cm: u32) {}

    fn set_car_distance(&mut self, _cm: u32) {}
}

#[derive(Default)]
pub(crate) struct CountingNotifier(Mutex<Vec<Direction>>);

impl CountingNotifier {
    pub(crate) fn calls(&self) -> Vec<Direction> {
        self.0.lock().unwrap().clone()
    }
}

impl StaffNotifier for CountingNotifier {
    fn notify(&self, direction: Direction) -> Result<(), NotifyError> {
        self.0.lock().unwrap().push(direction);
        Ok(())
    }
}

type Build<S> = fn(
    &str,
    GateEnv,
    Arc<dyn RemoteStore>,
    Arc<dyn Clock>,
    EngineSettings,
) -> Result<Chart<S>, BuildError>;

/// A started chart wired to in-memory collaborators.
pub(crate) struct Rig<S: State + 'static> {
    pub chart: Chart<S>,
    pub gate: FakeGate,
    pub plates: PlateSender,
    pub ledger: Arc<MemoryLedger>,
    pub notifier: Arc<CountingNotifier>,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
}

impl<S: State + 'static> Rig<S> {
    pub(crate) fn new(name: &str, build: Build<S>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new();
        let (detector, plates) = Detector::new(name, store.clone(), Arc::new(clock.clone()));
        let gate = FakeGate::default();
        let ledger = Arc::new(MemoryLedger::new(Arc::new(clock.clone())));
        let notifier = Arc::new(CountingNotifier::default());
        let env = GateEnv::new(detector, Box::new(gate.clone()), ledger.clone(), notifier.clone())
            .with_timeouts(Timeouts::default());
        let mut chart = build(
            name,
            env,
            store.clone(),
            Arc::new(clock.clone()),
            EngineSettings::default(),
        )
        .unwrap();
        chart.start();
        Self {
            chart,
            gate,
            plates,
            ledger,
            notifier,
            store,
            clock,
        }
    }

    pub(crate) fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.chart.tick();
        }
    }

    pub(crate) fn state(&self) -> S {
        self.chart.state()
    }

    pub(crate) fn info_str(&self, key: &str) -> Option<String> {
        self.chart
            .engine()
            .session()
            .get_str(key)
            .map(str::to_string)
    }

    pub(crate) fn info_bool(&self, key: &str) -> Option<bool> {
        self.chart.engine().session().get_bool(key)
    }

    pub(crate) fn notifications(&self) -> usize {
        self.notifier.calls().len()
    }
}
