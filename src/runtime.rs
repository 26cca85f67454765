//! Fixed-rate cooperative scheduling of charts and controller clients.
//!
//! Each worker runs on its own tokio task. Ticks are synchronous; the stop
//! flag is checked once per tick boundary, so a tick that has started always
//! finishes.

use crate::charts::Chart;
use crate::controller::ControllerClient;
use crate::core::State;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Shared stop flag for every spawned worker.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Something ticked at a fixed rate.
pub trait Worker: Send + 'static {
    fn name(&self) -> String;

    fn start(&mut self);

    /// One non-blocking iteration.
    fn step(&mut self);

    fn stop(&mut self);
}

impl<S: State + 'static> Worker for Chart<S> {
    fn name(&self) -> String {
        Chart::name(self).to_string()
    }

    fn start(&mut self) {
        Chart::start(self);
    }

    fn step(&mut self) {
        self.tick();
    }

    fn stop(&mut self) {
        Chart::stop(self);
    }
}

impl Worker for ControllerClient {
    fn name(&self) -> String {
        self.namespace().to_string()
    }

    fn start(&mut self) {
        ControllerClient::start(self);
    }

    fn step(&mut self) {
        self.sync();
    }

    fn stop(&mut self) {
        ControllerClient::stop(self);
    }
}

/// Start `worker` and step it every `period` until `stop` is raised.
///
/// Late ticks are skipped rather than bunched. The handle yields the worker
/// back once it has stopped.
pub fn spawn_worker<W: Worker>(mut worker: W, period: Duration, stop: StopHandle) -> JoinHandle<W> {
    tokio::spawn(async move {
        let name = worker.name();
        worker.start();
        info!(worker = %name, period_ms = period.as_millis() as u64, "Worker started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut steps: u64 = 0;
        loop {
            interval.tick().await;
            if stop.is_stopped() {
                break;
            }
            worker.step();
            steps += 1;
        }

        worker.stop();
        debug!(worker = %name, steps, "Worker stopped");
        worker
    })
}
