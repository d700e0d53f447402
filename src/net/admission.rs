//! Admission control for concurrently active connections.
//!
//! Uses a semaphore to enforce `max_connections`. Unlike a backpressure
//! limiter, acquisition never waits: when every slot is held the caller is
//! expected to reject the connection.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Bounded counting gate shared by the acceptor and its handlers.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    slots: Arc<Semaphore>,
    max: usize,
}

impl AdmissionController {
    pub fn new(max: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Take a slot if one is free. Never waits.
    pub fn try_acquire(&self) -> Option<AdmissionSlot> {
        let permit = Arc::clone(&self.slots).try_acquire_owned().ok()?;
        Some(AdmissionSlot {
            _permit: permit,
            slots: Arc::clone(&self.slots),
            max: self.max,
        })
    }

    /// Configured maximum.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Slots currently held.
    pub fn held(&self) -> usize {
        self.max - self.slots.available_permits()
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

/// One held admission slot.
///
/// The slot returns to the pool when dropped, so release happens exactly once
/// on every exit path, including a panicking handler.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
    slots: Arc<Semaphore>,
    max: usize,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        // The permit field is released after this body runs.
        let remaining = (self.max - self.slots.available_permits()).saturating_sub(1);
        metrics::record_connection_closed(remaining);
        tracing::trace!(held = remaining, "Admission slot released");
    }
}
