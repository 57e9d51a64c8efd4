//! Persistence seam for the audit trail.
//!
//! The trail never talks to storage directly; it hands batches to an
//! [`AuditSink`]. Delivery is at-least-once: a sink may see the same batch
//! again after a reported failure, so implementations must be retry-safe.
//! Exactly-once is not guaranteed and not required.

use crate::event::AuditEvent;
use std::sync::Mutex;
use thiserror::Error;

/// A sink rejected a batch. The trail restores the batch to its buffer;
/// whether and when to retry is the caller's decision.
#[derive(Debug, Error)]
#[error("Audit sink failure: {0}")]
pub struct SinkError(pub String);

/// Durable destination for audit events.
///
/// Implementations should bound their own I/O time; the trail calls
/// `persist` from flush paths that callers may be waiting on.
pub trait AuditSink: Send + Sync {
    /// Persists a batch. At-least-once semantics: returning an error
    /// means the same events will be offered again.
    fn persist(&self, events: &[AuditEvent]) -> Result<(), SinkError>;
}

/// In-memory [`AuditSink`]: the test fake, also usable as a staging sink.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything persisted so far, in arrival order.
    pub fn persisted(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("memory sink lock poisoned").clone()
    }

    /// Number of events persisted so far.
    pub fn len(&self) -> usize {
        self.events.lock().expect("memory sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemorySink {
    fn persist(&self, events: &[AuditEvent]) -> Result<(), SinkError> {
        self.events
            .lock()
            .expect("memory sink lock poisoned")
            .extend_from_slice(events);
        Ok(())
    }
}
