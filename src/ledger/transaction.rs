//! Ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Settlement status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[default]
    Unpaid,
    Paid,
}

/// One visit of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tid: String,
    pub license_number: String,
    pub timestamp_in: DateTime<Utc>,
    #[serde(default)]
    pub timestamp_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default)]
    pub fee: f64,
    #[serde(default)]
    pub paid: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_out: Option<String>,
}

impl Transaction {
    pub fn new(
        tid: impl Into<String>,
        license_number: impl Into<String>,
        timestamp_in: DateTime<Utc>,
    ) -> Self {
        Self {
            tid: tid.into(),
            license_number: license_number.into(),
            timestamp_in,
            timestamp_out: None,
            status: TransactionStatus::Unpaid,
            fee: 0.0,
            paid: 0.0,
            image_in: None,
            image_out: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == TransactionStatus::Paid
    }

    /// The vehicle has left through the exit gate.
    pub fn is_out(&self) -> bool {
        self.timestamp_out.is_some()
    }

    /// Still inside the car park.
    pub fn is_open(&self) -> bool {
        !self.is_out()
    }

    /// Left without settling.
    pub fn is_unpaid_out(&self) -> bool {
        self.is_out() && !self.is_paid()
    }
}
