//! Daemon configuration.
//!
//! Every section is optional; missing keys take the defaults below.
//!
//! ```toml
//! [engine]
//! tick_ms = 50
//! heartbeat_secs = 5
//! history_capacity = 64
//!
//! [timeouts]
//! detect_secs = 30
//! failed_secs = 15
//! failed_max_secs = 120
//! payment_secs = 120
//! car_clear_secs = 5
//! cooldown_secs = 5
//!
//! [controller]
//! hover_distance_cm = 5
//! car_distance_cm = 150
//!
//! [gates]
//! entrance = "entrance"
//! exit = "exit"
//! ```

use crate::charts::{EngineSettings, Timeouts};
use crate::controller::ControllerConfig;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A single problem found while validating a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigViolation {
    #[error("engine.tick_ms must be positive")]
    ZeroTick,

    #[error("engine.heartbeat_secs must be positive")]
    ZeroHeartbeat,

    #[error("engine.history_capacity must be positive")]
    ZeroHistory,

    #[error("timeouts.{name} must be positive")]
    ZeroTimeout { name: &'static str },

    #[error("gates.{gate} name is empty")]
    EmptyGateName { gate: &'static str },

    #[error("Entrance and exit share the gate name '{name}'")]
    SameGateName { name: String },

    #[error("controller.{name} must be positive")]
    ZeroDistance { name: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {}", render(.0))]
    Invalid(Vec<ConfigViolation>),
}

fn render(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub tick_ms: u64,
    pub heartbeat_secs: u64,
    pub history_capacity: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            heartbeat_secs: 5,
            history_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSection {
    pub detect_secs: u64,
    pub failed_secs: u64,
    pub failed_max_secs: u64,
    pub payment_secs: u64,
    pub car_clear_secs: u64,
    pub cooldown_secs: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            detect_secs: 30,
            failed_secs: 15,
            failed_max_secs: 120,
            payment_secs: 120,
            car_clear_secs: 5,
            cooldown_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateNames {
    pub entrance: String,
    pub exit: String,
}

impl Default for GateNames {
    fn default() -> Self {
        Self {
            entrance: "entrance".to_string(),
            exit: "exit".to_string(),
        }
    }
}

/// Top-level configuration of the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub engine: EngineSection,
    pub timeouts: TimeoutSection,
    pub controller: ControllerConfig,
    pub gates: GateNames,
}

type Check = Validation<(), NonEmptyVec<ConfigViolation>>;

impl GateConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Report every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut checks: Vec<Check> = Vec::new();
        let mut require = |ok: bool, violation: ConfigViolation| {
            if !ok {
                checks.push(Validation::fail(violation));
            }
        };

        require(self.engine.tick_ms > 0, ConfigViolation::ZeroTick);
        require(self.engine.heartbeat_secs > 0, ConfigViolation::ZeroHeartbeat);
        require(self.engine.history_capacity > 0, ConfigViolation::ZeroHistory);

        let t = &self.timeouts;
        for (name, secs) in [
            ("detect_secs", t.detect_secs),
            ("failed_secs", t.failed_secs),
            ("failed_max_secs", t.failed_max_secs),
            ("payment_secs", t.payment_secs),
            ("car_clear_secs", t.car_clear_secs),
        ] {
            require(secs > 0, ConfigViolation::ZeroTimeout { name });
        }

        let entrance = self.gates.entrance.trim();
        let exit = self.gates.exit.trim();
        require(
            !entrance.is_empty(),
            ConfigViolation::EmptyGateName { gate: "entrance" },
        );
        require(!exit.is_empty(), ConfigViolation::EmptyGateName { gate: "exit" });
        require(
            entrance.is_empty() || entrance != exit,
            ConfigViolation::SameGateName {
                name: entrance.to_string(),
            },
        );

        require(
            self.controller.hover_distance_cm > 0,
            ConfigViolation::ZeroDistance {
                name: "hover_distance_cm",
            },
        );
        require(
            self.controller.car_distance_cm > 0,
            ConfigViolation::ZeroDistance {
                name: "car_distance_cm",
            },
        );

        match Validation::all_vec(checks) {
            Validation::Success(_) => Ok(()),
            Validation::Failure(errors) => {
                Err(ConfigError::Invalid(errors.iter().cloned().collect()))
            }
        }
    }

    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.engine.tick_ms)
    }

    pub fn timeouts(&self) -> Timeouts {
        let t = &self.timeouts;
        Timeouts {
            detect: secs(t.detect_secs),
            failed: secs(t.failed_secs),
            failed_max: secs(t.failed_max_secs),
            payment: secs(t.payment_secs),
            car_clear: secs(t.car_clear_secs),
            cooldown: secs(t.cooldown_secs),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            heartbeat: secs(self.engine.heartbeat_secs),
            history_capacity: self.engine.history_capacity,
        }
    }
}

fn secs(value: u64) -> Duration {
    let capped = value.min(u64::from(u32::MAX));
    Duration::seconds(capped as i64)
}
