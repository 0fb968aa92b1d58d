//! UDP → HTTP snapshot relay
//!
//! Registers with a UDP producer, keeps the most recent JSON payload it
//! sends, and serves that payload to any number of HTTP pollers.
//!
//! # Architecture
//!
//! ```text
//!   producer ◄── "register" (startup + every silent window) ──┐
//!      │                                                      │
//!      └─ JSON datagrams ─► IngestLoop ── decode ──► SnapshotStore
//!                                                        │ get()
//!                                      GET /data ◄── handlers::data ◄─┘
//!                                                   (optional Jitter)
//! ```
//!
//! The ingest loop and the HTTP handlers share nothing except the
//! [`snapshot::SnapshotStore`] and the atomic [`metrics::RelayMetrics`].

pub mod codec;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingestion;
pub mod metrics;
pub mod perturb;
pub mod registration;
pub mod router;
pub mod snapshot;
pub mod state;

pub use config::RelayConfig;
pub use ingestion::{IngestConfig, IngestLoop, IngestStats};
pub use router::create_router;
pub use snapshot::{Snapshot, SnapshotStore};
pub use state::AppState;
