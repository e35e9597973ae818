//! Monotonic operation counters.
//!
//! Lock-free atomics; `snapshot()` produces the point-in-time name→count
//! mapping exposed by the server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing counters for store and replication activity.
#[derive(Debug, Default)]
pub struct Metrics {
    writes: AtomicU64,
    reads: AtomicU64,
    deletes: AtomicU64,
    replication_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_writes(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_replication_failures(&self) {
        self.replication_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of all counters.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        HashMap::from([
            ("writes".to_string(), self.writes.load(Ordering::Relaxed)),
            ("reads".to_string(), self.reads.load(Ordering::Relaxed)),
            ("deletes".to_string(), self.deletes.load(Ordering::Relaxed)),
            (
                "replication_failures".to_string(),
                self.replication_failures.load(Ordering::Relaxed),
            ),
        ])
    }
}
