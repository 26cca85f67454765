//! Chart-side controller facade.

use super::{ControllerConfig, ControllerStatus, GateControl, SensorSnapshot, CONTROLLER_COMPONENT};
use crate::remote::{Namespace, RemoteStore};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reads the controller's published status and writes to its command slot.
pub struct RemoteController {
    namespace: Namespace,
    store: Arc<dyn RemoteStore>,
    status: ControllerStatus,
    config: ControllerConfig,
}

impl RemoteController {
    pub fn new(gate: &str, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            namespace: Namespace::new(gate, CONTROLLER_COMPONENT),
            store,
            status: ControllerStatus::default(),
            config: ControllerConfig::default(),
        }
    }

    /// Last status read from the store.
    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    /// Last config read from the store.
    pub fn config(&self) -> ControllerConfig {
        self.config
    }

    fn send(&self, command: String) {
        match self.store.set(&self.namespace.command(), Value::String(command.clone())) {
            Ok(()) => info!(controller = %self.namespace, command = %command, "Controller command sent"),
            Err(err) => warn!(controller = %self.namespace, error = %err, "Failed to send controller command"),
        }
    }

    fn read<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        match self.store.get(path) {
            Ok(Some(value @ Value::Object(_))) => match serde_json::from_value(value) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    debug!(path, error = %err, "Ignoring malformed controller document");
                    None
                }
            },
            Ok(_) => None,
            Err(err) => {
                warn!(path, error = %err, "Failed to read controller document");
                None
            }
        }
    }
}

impl GateControl for RemoteController {
    fn open_barricade(&mut self) {
        self.send("open_barricade".to_string());
    }

    fn close_barricade(&mut self) {
        self.send("close_barricade".to_string());
    }

    fn sensors(&self) -> SensorSnapshot {
        self.status.sensors()
    }

    fn set_hover_distance(&mut self, cm: u32) {
        self.send(format!("set_hover_distance:{cm}"));
    }

    fn set_car_distance(&mut self, cm: u32) {
        self.send(format!("set_car_distance:{cm}"));
    }

    fn sync(&mut self) {
        if let Some(status) = self.read(&self.namespace.status()) {
            self.status = status;
        }
        if let Some(config) = self.read(&self.namespace.config()) {
            self.config = config;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use serde_json::json;

    fn controller() -> (RemoteController, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (RemoteController::new("exit", store.clone()), store)
    }

    #[test]
    fn commands_are_written_to_slot() {
        let (mut controller, store) = controller();

        controller.open_barricade();
        assert_eq!(store.value("exit/controller/command"), json!("open_barricade"));

        controller.set_hover_distance(8);
        assert_eq!(store.value("exit/controller/command"), json!("set_hover_distance:8"));

        controller.set_car_distance(120);
        assert_eq!(store.value("exit/controller/command"), json!("set_car_distance:120"));
    }

    #[test]
    fn sync_caches_latest_status() {
        let (mut controller, store) = controller();
        assert_eq!(controller.sensors(), SensorSnapshot::default());

        store
            .set("exit/controller/status", json!({"hover": true, "car_present": true}))
            .unwrap();
        store
            .set("exit/controller/config", json!({"hover_distance_cm": 9, "car_distance_cm": 99}))
            .unwrap();
        controller.sync();

        let sensors = controller.sensors();
        assert!(sensors.hover);
        assert!(sensors.car_present);
        assert!(!sensors.button_pressed);
        assert_eq!(controller.config().hover_distance_cm, 9);
    }

    #[test]
    fn malformed_status_keeps_previous() {
        let (mut controller, store) = controller();
        store.set("exit/controller/status", json!({"button": true})).unwrap();
        controller.sync();

        store.set("exit/controller/status", json!({"button": "yes"})).unwrap();
        controller.sync();

        assert!(controller.sensors().button_pressed);
    }
}
