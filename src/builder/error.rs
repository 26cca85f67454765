//! Build errors for chart construction.

use thiserror::Error;

/// A single problem found while validating a chart definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChartViolation {
    #[error("Chart name is empty")]
    EmptyName,

    #[error("State '{state}' has no hook record. Register it with .state()")]
    UnregisteredState { state: String },

    #[error("State '{state}' is registered more than once")]
    DuplicateState { state: String },

    #[error("Command verb '{verb}' is invalid (must be non-empty, without ':' or whitespace)")]
    InvalidVerb { verb: String },

    #[error("Command verb '{verb}' is registered more than once")]
    DuplicateVerb { verb: String },

    #[error("Heartbeat interval must be positive")]
    NonPositiveHeartbeat,
}

/// Errors that can occur when building a chart.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("Chart '{chart}' is invalid: {}", render(.violations))]
    Invalid {
        chart: String,
        violations: Vec<ChartViolation>,
    },
}

impl BuildError {
    /// Every violation found, empty for other variants.
    pub fn violations(&self) -> &[ChartViolation] {
        match self {
            Self::Invalid { violations, .. } => violations,
            Self::MissingInitialState => &[],
        }
    }
}

fn render(violations: &[ChartViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
