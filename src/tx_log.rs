//! In-memory transaction history.
//!
//! Records are kept newest-first and keyed by their `TxId`. A record enters the
//! log as `Pending` and is resolved exactly once; nothing is ever removed.
//! The display view is truncated to `display_limit` rows.
//!
//! Typical usage (shared):
//! let log = new_shared(5);
//! let id = log.lock().await.record_pending(id, op)?;
//! // ... executor resolves ...
//! log.lock().await.resolve(&id, TxStatus::Success, Some(sig), None)?;

use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::types::{Operation, TransactionRecord, TxId, TxStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("transaction {0} is already recorded")]
    DuplicateId(TxId),
    #[error("transaction {0} is not in the log")]
    UnknownId(TxId),
    #[error("transaction {id} cannot move from {from} to {to}")]
    InvalidTransition { id: TxId, from: TxStatus, to: TxStatus },
}

#[derive(Debug)]
pub struct TransactionLog {
    /// Newest at the front.
    records: VecDeque<TransactionRecord>,
    display_limit: usize,
}

impl TransactionLog {
    pub fn new(display_limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            display_limit,
        }
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.records.iter().any(|r| &r.id == id)
    }

    /// Prepend a new pending record.
    pub fn record_pending(&mut self, id: TxId, operation: Operation) -> Result<TxId, LogError> {
        if self.contains(&id) {
            return Err(LogError::DuplicateId(id));
        }
        self.records
            .push_front(TransactionRecord::pending(id.clone(), operation));
        Ok(id)
    }

    /// Move a pending record to its terminal status. No other record is touched.
    pub fn resolve(
        &mut self,
        id: &TxId,
        to: TxStatus,
        signature: Option<String>,
        failure: Option<String>,
    ) -> Result<&TransactionRecord, LogError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| LogError::UnknownId(id.clone()))?;

        let next = record
            .status
            .transition(to)
            .ok_or_else(|| LogError::InvalidTransition {
                id: id.clone(),
                from: record.status,
                to,
            })?;

        record.status = next;
        record.signature = signature;
        record.failure = failure;
        Ok(&*record)
    }

    pub fn get(&self, id: &TxId) -> Option<&TransactionRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Most recent records, newest first, at most `display_limit`.
    pub fn recent(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter().take(self.display_limit)
    }

    /// Every record, newest first.
    pub fn all(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == TxStatus::Pending)
            .count()
    }
}

pub type SharedTransactionLog = Arc<Mutex<TransactionLog>>;

pub fn new_shared(display_limit: usize) -> SharedTransactionLog {
    Arc::new(Mutex::new(TransactionLog::new(display_limit)))
}
