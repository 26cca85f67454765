//! Staff escalation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Which side of the car park a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }

    /// Gate label used in staff messages.
    pub fn gate_label(&self) -> &'static str {
        match self {
            Self::In => "ENTRANCE",
            Self::Out => "EXIT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Pages a member of staff to a gate.
///
/// Calls must return promptly; slow transports should queue and deliver in
/// the background.
pub trait StaffNotifier: Send + Sync {
    fn notify(&self, direction: Direction) -> Result<(), NotifyError>;
}

/// Fire a notification, logging instead of propagating failures.
pub fn call_staff(notifier: &dyn StaffNotifier, direction: Direction) {
    match notifier.notify(direction) {
        Ok(()) => info!(gate = direction.gate_label(), "Staff called"),
        Err(err) => warn!(gate = direction.gate_label(), error = %err, "Cannot notify staff"),
    }
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl StaffNotifier for LogNotifier {
    fn notify(&self, direction: Direction) -> Result<(), NotifyError> {
        info!(gate = direction.gate_label(), "CALL STAFF");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl StaffNotifier for Failing {
        fn notify(&self, _direction: Direction) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("offline".into()))
        }
    }

    #[test]
    fn direction_labels() {
        assert_eq!(Direction::In.as_str(), "in");
        assert_eq!(Direction::Out.to_string(), "out");
        assert_eq!(Direction::Out.gate_label(), "EXIT");
        assert_eq!(serde_json::to_string(&Direction::In).unwrap(), "\"in\"");
    }

    #[test]
    fn call_staff_swallows_failures() {
        call_staff(&Failing, Direction::In);
        call_staff(&LogNotifier, Direction::Out);
    }
}
