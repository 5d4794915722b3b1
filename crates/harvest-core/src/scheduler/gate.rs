//! Admission gate bounding how many jobs are active at once.
//!
//! A counting semaphore of `capacity` slots, instrumented with the number of
//! current holders and the highest number ever observed at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl AdmissionGate {
    /// Create a gate with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            in_use: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Highest number of slots held at the same time so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Waits for a free slot. Returns `None` once the gate has been closed.
    pub async fn admit(self: &Arc<Self>) -> Option<GatePermit> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;
        let now = self.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        Some(GatePermit {
            gate: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Wakes every waiter with `None` and refuses further admissions.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// One held slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<AdmissionGate>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Runs before `_permit` is released, so `in_use` never exceeds capacity.
        self.gate.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}
