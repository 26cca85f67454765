//! Billing ledger collaborator.
//!
//! Both gate charts share one [`Ledger`]. The entrance registers vehicles
//! through [`Ledger::reserve`], which must check for a conflicting
//! transaction and insert the new one as a single atomic step: the two
//! charts tick independently and may race on the same plate.
//!
//! Receipt images are taken by a [`ReceiptCamera`] as a side effect of
//! reserving ("in") and closing ("out"). Capture failures never fail the
//! ledger operation.

mod memory;
mod transaction;

pub use memory::MemoryLedger;
pub use transaction::{Transaction, TransactionStatus};

use crate::notify::Direction;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a plate could not be registered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReserveError {
    #[error("license number '{license_number}' already has an open transaction ({tid})")]
    Open { license_number: String, tid: String },

    #[error("license number '{license_number}' has an unpaid transaction ({tid})")]
    Unpaid { license_number: String, tid: String },

    #[error("license number is empty")]
    EmptyLicenseNumber,

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl ReserveError {
    /// The transaction that blocked the reservation, if any.
    pub fn conflicting_tid(&self) -> Option<&str> {
        match self {
            Self::Open { tid, .. } | Self::Unpaid { tid, .. } => Some(tid),
            Self::EmptyLicenseNumber | Self::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transaction '{0}' not found")]
    NotFound(String),

    #[error("transaction '{0}' is already closed")]
    AlreadyClosed(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Transaction store shared by the entrance and exit charts.
pub trait Ledger: Send + Sync {
    /// Atomically check for a conflicting transaction and register a new one.
    ///
    /// Fails when the plate has an open transaction, or one that left
    /// without paying, and reports that transaction's id.
    fn reserve(&self, license_number: &str) -> Result<String, ReserveError>;

    /// Id of the open transaction for a plate.
    fn find_open(&self, license_number: &str) -> Option<String>;

    fn get(&self, tid: &str) -> Option<Transaction>;

    fn is_paid(&self, tid: &str) -> bool {
        self.get(tid).is_some_and(|tx| tx.is_paid())
    }

    /// Stamp the exit time and capture the exit receipt image.
    fn close(&self, tid: &str) -> Result<Transaction, LedgerError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),

    #[error("upload failed: {0}")]
    Upload(String),
}

/// Takes and stores a receipt image, returning where it can be fetched.
pub trait ReceiptCamera: Send + Sync {
    fn capture(
        &self,
        license_number: &str,
        at: DateTime<Utc>,
        direction: Direction,
    ) -> Result<String, CaptureError>;
}

/// Storage path of a receipt image.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use parkgate::ledger::receipt_path;
/// use parkgate::notify::Direction;
///
/// let at = Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap();
/// assert_eq!(
///     receipt_path("ABC123", at, Direction::In),
///     "transactions/2026-10-14/in/2026-10-14T09:30:00_ABC123.jpg"
/// );
/// ```
pub fn receipt_path(license_number: &str, at: DateTime<Utc>, direction: Direction) -> String {
    format!(
        "transactions/{}/{}/{}_{}.jpg",
        at.format("%Y-%m-%d"),
        direction,
        at.format("%Y-%m-%dT%H:%M:%S"),
        license_number
    )
}
