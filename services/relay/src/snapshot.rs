//! Last-value store shared by the ingest loop and the HTTP handlers.
//!
//! Holds exactly one [`Snapshot`] at a time. The ingest loop is the only
//! writer; any number of request handlers read concurrently. Writes replace
//! the snapshot wholesale, and readers receive a shared `Arc` so the lock is
//! held only for a pointer swap or clone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Status marker served before the producer has sent anything.
pub const PLACEHOLDER_STATUS: &str = "Waiting for data...";

/// The most recently received payload plus its freshness metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Decoded payload, or the placeholder before first receipt.
    pub value: Value,
    /// Number of successful `set` calls that produced this snapshot. Zero
    /// marks the placeholder.
    pub sequence: u64,
    /// Wall-clock time the payload was stored.
    pub received_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// The snapshot held before the first successful receipt.
    pub fn placeholder() -> Self {
        Self {
            value: json!({ "status": PLACEHOLDER_STATUS }),
            sequence: 0,
            received_at: None,
        }
    }

    /// Whether this snapshot carries producer data.
    pub fn is_placeholder(&self) -> bool {
        self.sequence == 0
    }

    /// Milliseconds elapsed since the payload was stored.
    pub fn age_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.received_at
            .map(|at| (now - at).num_milliseconds().max(0))
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Single-slot store guarding the live snapshot.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    /// Sequence of the last `set`. Only the single writer advances it.
    sequence: AtomicU64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::placeholder())),
            sequence: AtomicU64::new(0),
        }
    }

    /// Replace the current snapshot with `value`.
    ///
    /// The new snapshot is built before the write lock is taken, and the
    /// previous one is dropped after it is released. The lock covers only
    /// the pointer swap.
    pub fn set(&self, value: Value) {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let next = Arc::new(Snapshot {
            value,
            sequence,
            received_at: Some(Utc::now()),
        });

        drop(self.swap(next));
    }

    /// Install `next` and hand back the previous snapshot once the write
    /// lock has been released.
    fn swap(&self, next: Arc<Snapshot>) -> Arc<Snapshot> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::mem::replace(&mut *guard, next);
        drop(guard);
        previous
    }

    /// Current snapshot. The returned `Arc` stays valid after later writes.
    pub fn get(&self) -> Arc<Snapshot> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Whether `set` has been called at least once.
    pub fn has_data(&self) -> bool {
        self.sequence.load(Ordering::Acquire) > 0
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
