//! Gate sensor and actuator facades.
//!
//! The controller lives in two halves that only meet through the remote
//! store under `<gate>/controller`:
//!
//! - [`ControllerClient`] sits next to the hardware. It receives decoded
//!   [`RawReading`]s, derives the boolean sensor flags from the configured
//!   distance thresholds, publishes `status` and `config`, and executes
//!   actuator commands.
//! - [`RemoteController`] sits next to the chart. It caches the latest
//!   published status and writes commands into the controller's slot.
//!
//! Charts only see the [`GateControl`] trait.

mod client;
mod remote;

pub use client::{Actuator, ActuatorError, ControllerClient, LogActuator, RawReading};
pub use remote::RemoteController;

use serde::{Deserialize, Serialize};

/// Remote component name of the controller.
pub const CONTROLLER_COMPONENT: &str = "controller";

/// What a chart needs to know about the gate at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSnapshot {
    /// A driver's hand is close to the kiosk sensor.
    pub hover: bool,
    pub button_pressed: bool,
    /// A vehicle is under the barricade sensor.
    pub car_present: bool,
    pub barricade_open: bool,
}

/// Status document published by the controller client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerStatus {
    /// Manual mode switch on the cabinet.
    pub mode: bool,
    pub open_button: bool,
    pub close_button: bool,
    pub hover: bool,
    pub button: bool,
    pub car_present: bool,
    pub barricade_open: bool,
}

impl ControllerStatus {
    pub fn sensors(&self) -> SensorSnapshot {
        SensorSnapshot {
            hover: self.hover,
            button_pressed: self.button,
            car_present: self.car_present,
            barricade_open: self.barricade_open,
        }
    }
}

/// Distance thresholds, in centimetres, for the two proximity sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub hover_distance_cm: u32,
    pub car_distance_cm: u32,
}

impl ControllerConfig {
    pub const DEFAULT_HOVER_DISTANCE_CM: u32 = 5;
    pub const DEFAULT_CAR_DISTANCE_CM: u32 = 150;
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            hover_distance_cm: Self::DEFAULT_HOVER_DISTANCE_CM,
            car_distance_cm: Self::DEFAULT_CAR_DISTANCE_CM,
        }
    }
}

/// Barricade control and sensor access as seen by a chart.
///
/// Writes are fire-and-forget; reads return the latest cached snapshot and
/// never block on I/O.
pub trait GateControl: Send {
    fn open_barricade(&mut self);

    fn close_barricade(&mut self);

    fn sensors(&self) -> SensorSnapshot;

    /// Operator adjustment of the kiosk hover threshold. Charts never call
    /// this; the daemon's `distance` input does.
    fn set_hover_distance(&mut self, cm: u32);

    /// Operator adjustment of the barricade car threshold.
    fn set_car_distance(&mut self, cm: u32);

    /// Refresh the cached snapshot. Called once per chart tick.
    fn sync(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_defaults_missing_fields() {
        let status: ControllerStatus = serde_json::from_value(json!({"hover": true})).unwrap();
        assert!(status.hover);
        assert!(!status.car_present);
        assert_eq!(
            status.sensors(),
            SensorSnapshot {
                hover: true,
                ..SensorSnapshot::default()
            }
        );
    }

    #[test]
    fn config_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.hover_distance_cm, 5);
        assert_eq!(config.car_distance_cm, 150);
    }
}
