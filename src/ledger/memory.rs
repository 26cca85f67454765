//! In-process ledger.

use super::{CaptureError, Ledger, LedgerError, ReceiptCamera, ReserveError};
use super::{Transaction, TransactionStatus};
use crate::core::Clock;
use crate::notify::Direction;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

/// Ledger kept in memory behind a single mutex.
///
/// Transactions are kept in insertion order, so plate lookups resolve to the
/// oldest matching transaction.
pub struct MemoryLedger {
    transactions: Mutex<Vec<Transaction>>,
    clock: Arc<dyn Clock>,
    camera: Option<Arc<dyn ReceiptCamera>>,
}

impl MemoryLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            transactions: Mutex::new(Vec::new()),
            clock,
            camera: None,
        }
    }

    pub fn with_camera(mut self, camera: Arc<dyn ReceiptCamera>) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Record settlement made outside the gate flow.
    pub fn set_status(&self, tid: &str, status: TransactionStatus) -> Result<(), LedgerError> {
        let mut transactions = self.lock();
        let tx = transactions
            .iter_mut()
            .find(|tx| tx.tid == tid)
            .ok_or_else(|| LedgerError::NotFound(tid.to_string()))?;
        tx.status = status;
        info!(tid, status = ?status, "Transaction status updated");
        Ok(())
    }

    pub fn mark_paid(&self, tid: &str) -> Result<(), LedgerError> {
        self.set_status(tid, TransactionStatus::Paid)
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Transaction>> {
        self.transactions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn capture(&self, license_number: &str, at: DateTime<Utc>, direction: Direction) -> Option<String> {
        let camera = self.camera.as_ref()?;
        match camera.capture(license_number, at, direction) {
            Ok(url) => Some(url),
            Err(err) => {
                log_capture_failure(&err, direction);
                None
            }
        }
    }

    fn attach_image(&self, tid: &str, direction: Direction, url: String) {
        if let Some(tx) = self.lock().iter_mut().find(|tx| tx.tid == tid) {
            match direction {
                Direction::In => tx.image_in = Some(url),
                Direction::Out => tx.image_out = Some(url),
            }
        }
    }
}

fn find_plate<'a>(
    transactions: &'a [Transaction],
    license_number: &str,
    predicate: fn(&Transaction) -> bool,
) -> Option<&'a Transaction> {
    transactions
        .iter()
        .find(|tx| tx.license_number == license_number && predicate(tx))
}

fn log_capture_failure(err: &CaptureError, direction: Direction) {
    warn!(gate = direction.gate_label(), error = %err, "Cannot capture receipt image");
}

impl Ledger for MemoryLedger {
    fn reserve(&self, license_number: &str) -> Result<String, ReserveError> {
        let license_number = license_number.trim();
        if license_number.is_empty() {
            return Err(ReserveError::EmptyLicenseNumber);
        }
        let now = self.clock.now();
        let tid = {
            let mut transactions = self.lock();
            if let Some(open) = find_plate(&transactions, license_number, Transaction::is_open) {
                warn!(license_number, tid = %open.tid, "Cannot add transaction, license number is in the car park");
                return Err(ReserveError::Open {
                    license_number: license_number.to_string(),
                    tid: open.tid.clone(),
                });
            }
            if let Some(unpaid) = find_plate(&transactions, license_number, Transaction::is_unpaid_out)
            {
                warn!(license_number, tid = %unpaid.tid, "Cannot add transaction, license number has an unpaid transaction");
                return Err(ReserveError::Unpaid {
                    license_number: license_number.to_string(),
                    tid: unpaid.tid.clone(),
                });
            }
            let tid = Uuid::new_v4().to_string();
            transactions.push(Transaction::new(tid.clone(), license_number, now));
            tid
        };
        info!(license_number, tid = %tid, "Transaction added");

        if let Some(url) = self.capture(license_number, now, Direction::In) {
            self.attach_image(&tid, Direction::In, url);
        }
        Ok(tid)
    }

    fn find_open(&self, license_number: &str) -> Option<String> {
        let found = self
            .lock()
            .iter()
            .find(|tx| tx.license_number == license_number && tx.is_open())
            .map(|tx| tx.tid.clone());
        match &found {
            Some(tid) => info!(license_number, tid = %tid, "License number exists"),
            None => info!(license_number, "License number not found"),
        }
        found
    }

    fn get(&self, tid: &str) -> Option<Transaction> {
        self.lock().iter().find(|tx| tx.tid == tid).cloned()
    }

    fn close(&self, tid: &str) -> Result<Transaction, LedgerError> {
        let now = self.clock.now();
        let license_number = {
            let mut transactions = self.lock();
            let tx = transactions
                .iter_mut()
                .find(|tx| tx.tid == tid)
                .ok_or_else(|| LedgerError::NotFound(tid.to_string()))?;
            if tx.is_out() {
                return Err(LedgerError::AlreadyClosed(tid.to_string()));
            }
            tx.timestamp_out = Some(now);
            tx.license_number.clone()
        };
        info!(tid, "Transaction closed");

        if let Some(url) = self.capture(&license_number, now, Direction::Out) {
            self.attach_image(tid, Direction::Out, url);
        }
        self.get(tid)
            .ok_or_else(|| LedgerError::NotFound(tid.to_string()))
    }
}
