//! # Streaming Statistics
//!
//! Counters describing how well preloading keeps up with the observer.

use std::time::Duration;

/// Running totals since the streamer was created.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamingStats {
    /// Grid shifts performed.
    pub shifts: u64,
    /// Slice production requests issued to the workers.
    pub slices_requested: u64,
    /// Slices promoted into the grid.
    pub slices_promoted: u64,
    /// Trailing slices handed to the opposite direction's queue.
    pub slices_recycled: u64,
    /// Queue entries dropped because they no longer matched the window.
    pub slices_superseded: u64,
    /// Queue entries moved along with a shift on the other axis.
    pub slices_adapted: u64,
    /// Producers started again for entries that gained empty slots.
    pub slot_refills: u64,
    /// Chunks loaded by producers.
    pub chunks_loaded: u64,
    /// Loaded chunks whose slot was gone when they arrived.
    pub chunks_discarded: u64,
    /// Failed chunk loads that were retried.
    pub producer_retries: u64,
    /// Shifts that had to wait for a slice still in production.
    pub stalls: u64,
    /// Total time spent waiting in stalls.
    pub stall_time: Duration,
    /// Chunks written to the store.
    pub chunks_persisted: u64,
    /// Chunks the store refused.
    pub persist_failures: u64,
    /// Tasks that panicked on a worker.
    pub worker_panics: u64,
}
