//! Hardware-side controller facade.

use super::{ControllerConfig, ControllerStatus, CONTROLLER_COMPONENT};
use crate::core::Clock;
use crate::remote::{
    CommandChannel, CommandTable, Handler, Heartbeat, Namespace, RemoteStore, StatusPublisher,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One decoded sample from the gate cabinet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReading {
    pub mode: bool,
    pub open_button: bool,
    pub close_button: bool,
    /// Kiosk button.
    pub button: bool,
    pub barricade_open: bool,
    pub hover_distance_cm: u32,
    pub car_distance_cm: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("actuator write failed: {0}")]
    Write(String),
}

/// Drives the barricade motor.
pub trait Actuator: Send {
    fn open(&mut self) -> Result<(), ActuatorError>;

    fn close(&mut self) -> Result<(), ActuatorError>;
}

/// Actuator that only logs, for running without hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogActuator;

impl Actuator for LogActuator {
    fn open(&mut self) -> Result<(), ActuatorError> {
        info!("Barricade opened");
        Ok(())
    }

    fn close(&mut self) -> Result<(), ActuatorError> {
        info!("Barricade closed");
        Ok(())
    }
}

/// What remote commands may touch.
struct Hardware {
    config: ControllerConfig,
    actuator: Box<dyn Actuator>,
}

/// Publishes sensor state and executes actuator commands for one gate.
pub struct ControllerClient {
    namespace: Namespace,
    readings: mpsc::UnboundedReceiver<RawReading>,
    latest: Option<RawReading>,
    hardware: Hardware,
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    status: StatusPublisher,
    config: StatusPublisher,
    heartbeat: Heartbeat,
    channel: CommandChannel,
    commands: CommandTable<Hardware>,
    running: bool,
}

impl ControllerClient {
    /// Create the client for `gate` and the sender the serial reader feeds.
    pub fn new(
        gate: &str,
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        config: ControllerConfig,
        actuator: Box<dyn Actuator>,
    ) -> (Self, mpsc::UnboundedSender<RawReading>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let namespace = Namespace::new(gate, CONTROLLER_COMPONENT);
        let client = Self {
            status: StatusPublisher::new(namespace.status()),
            config: StatusPublisher::new(namespace.config()),
            heartbeat: Heartbeat::new(
                namespace.heartbeat(),
                Duration::seconds(Heartbeat::DEFAULT_INTERVAL_SECS),
            ),
            channel: CommandChannel::new(&namespace),
            namespace,
            readings: rx,
            latest: None,
            hardware: Hardware { config, actuator },
            store,
            clock,
            commands: command_table(),
            running: false,
        };
        (client, tx)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn controller_config(&self) -> ControllerConfig {
        self.hardware.config
    }

    /// Status derived from the latest reading and current thresholds.
    ///
    /// Before the first reading every flag is `false`.
    pub fn status(&self) -> ControllerStatus {
        let Some(reading) = self.latest else {
            return ControllerStatus::default();
        };
        let config = self.hardware.config;
        ControllerStatus {
            mode: reading.mode,
            open_button: reading.open_button,
            close_button: reading.close_button,
            hover: reading.hover_distance_cm <= config.hover_distance_cm,
            button: reading.button,
            car_present: reading.car_distance_cm <= config.car_distance_cm,
            barricade_open: reading.barricade_open,
        }
    }

    pub fn start(&mut self) {
        if self.running {
            warn!(controller = %self.namespace, "Controller client is already running");
            return;
        }
        info!(controller = %self.namespace, "Controller client starting");
        self.running = true;
        let store = Arc::clone(&self.store);
        self.status.publish(&*store, &self.status_view());
        self.config.publish(&*store, &self.config_view());
        self.heartbeat.force(&*store, self.clock.now());
        self.channel.clear(&*store);
    }

    pub fn stop(&mut self) {
        if self.running {
            info!(controller = %self.namespace, "Controller client stopping");
            self.running = false;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Take pending readings, publish diffs, heartbeat and run one command.
    pub fn sync(&mut self) {
        if !self.running {
            return;
        }
        while let Ok(reading) = self.readings.try_recv() {
            self.latest = Some(reading);
        }
        let store = Arc::clone(&self.store);
        if self.status.publish_if_changed(&*store, &self.status_view()) {
            debug!(controller = %self.namespace, "Status updated");
        }
        if self.config.publish_if_changed(&*store, &self.config_view()) {
            debug!(controller = %self.namespace, "Config updated");
        }
        self.heartbeat.beat(&*store, self.clock.now());
        self.channel.poll(&*store, &self.commands, &mut self.hardware);
    }

    fn status_view(&self) -> serde_json::Value {
        serde_json::to_value(self.status()).unwrap_or_default()
    }

    fn config_view(&self) -> serde_json::Value {
        serde_json::to_value(self.hardware.config).unwrap_or_default()
    }
}

fn command_table() -> CommandTable<Hardware> {
    CommandTable::new()
        .with(
            "set_hover_distance",
            Handler::arg(|hw: &mut Hardware, arg: &str| match parse_cm(arg) {
                Some(cm) => {
                    hw.config.hover_distance_cm = cm;
                    info!(cm, "Set hover distance");
                }
                None => warn!(arg, "Invalid hover distance"),
            }),
        )
        .with(
            "set_car_distance",
            Handler::arg(|hw: &mut Hardware, arg: &str| match parse_cm(arg) {
                Some(cm) => {
                    hw.config.car_distance_cm = cm;
                    info!(cm, "Set car distance");
                }
                None => warn!(arg, "Invalid car distance"),
            }),
        )
        .with(
            "open_barricade",
            Handler::unit(|hw: &mut Hardware| {
                if let Err(err) = hw.actuator.open() {
                    warn!(error = %err, "Cannot open barricade");
                }
            }),
        )
        .with(
            "close_barricade",
            Handler::unit(|hw: &mut Hardware| {
                if let Err(err) = hw.actuator.close() {
                    warn!(error = %err, "Cannot close barricade");
                }
            }),
        )
}

fn parse_cm(arg: &str) -> Option<u32> {
    arg.trim().parse().ok().filter(|cm| *cm > 0)
}
