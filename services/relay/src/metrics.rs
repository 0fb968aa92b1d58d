//! Relay counters
//!
//! Lock-free counters updated by the ingest loop and the HTTP handlers and
//! reported by `/healthz`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RelayMetrics {
    pub datagrams_received: AtomicU64,
    pub datagrams_accepted: AtomicU64,
    pub datagrams_dropped: AtomicU64,
    pub registrations_sent: AtomicU64,
    pub polls_served: AtomicU64,
}

/// Point-in-time copy of [`RelayMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub datagrams_received: u64,
    pub datagrams_accepted: u64,
    pub datagrams_dropped: u64,
    pub registrations_sent: u64,
    pub polls_served: u64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.datagrams_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_registration(&self) {
        self.registrations_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll(&self) {
        self.polls_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_accepted: self.datagrams_accepted.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            registrations_sent: self.registrations_sent.load(Ordering::Relaxed),
            polls_served: self.polls_served.load(Ordering::Relaxed),
        }
    }
}
