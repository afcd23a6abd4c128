//! Request/response correlation for the polling bridge
//!
//! The host engine calls the bridge synchronously and polls for results, so
//! every slow request is keyed by a caller-supplied identifier and joined
//! back to a later poll through this table. Records are inserted atomically
//! with the presence check and replaced wholesale on completion, so at most
//! one background task ever exists per identifier and a concurrent poll
//! never observes a torn record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub status: RequestStatus,
    pub payload: String,
}

impl RequestRecord {
    pub fn pending() -> Self {
        Self {
            status: RequestStatus::Pending,
            payload: "processing".to_string(),
        }
    }

    pub fn success(payload: String) -> Self {
        Self {
            status: RequestStatus::Success,
            payload,
        }
    }

    pub fn error(payload: String) -> Self {
        Self {
            status: RequestStatus::Error,
            payload,
        }
    }
}

/// Outcome of a poll against the table
#[derive(Debug)]
pub enum Poll {
    /// Identifier was never started (or already consumed)
    Missing,
    /// Background task has not finished yet
    Pending,
    /// Terminal result, removed from the table by this poll
    Finished(RequestRecord),
}

/// Process-wide map from request identifier to request state. Unbounded,
/// no expiry: an identifier that is never polled keeps its record for the
/// process lifetime.
#[derive(Clone, Default)]
pub struct CorrelationTable {
    inner: Arc<Mutex<HashMap<String, RequestRecord>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a Pending record for `id` unless the identifier is already
    /// present in any status. Check and insert happen under one lock, so
    /// two near-simultaneous starts for the same id cannot both win.
    pub fn try_begin(&self, id: &str) -> bool {
        let mut table = self.inner.lock().expect("correlation table poisoned");
        if table.contains_key(id) {
            return false;
        }
        table.insert(id.to_string(), RequestRecord::pending());
        true
    }

    /// Replace the record for `id` with a terminal result. Only the task
    /// launched for `id` calls this, exactly once.
    pub fn complete(&self, id: &str, record: RequestRecord) {
        let mut table = self.inner.lock().expect("correlation table poisoned");
        table.insert(id.to_string(), record);
    }

    /// Read the record for `id`, consuming it when terminal. Error records
    /// are evicted on read just like Success records, so a failed
    /// identifier can be reused instead of replaying its error forever.
    pub fn poll_take(&self, id: &str) -> Poll {
        let mut table = self.inner.lock().expect("correlation table poisoned");
        match table.get(id) {
            None => Poll::Missing,
            Some(record) if record.status == RequestStatus::Pending => Poll::Pending,
            Some(_) => {
                let record = table.remove(id).expect("record vanished under lock");
                Poll::Finished(record)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("correlation table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
