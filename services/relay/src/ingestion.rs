//! Datagram ingest loop
//!
//! Receives producer datagrams, decodes them and publishes each good payload
//! into the [`SnapshotStore`]. Bad payloads are expected on an unreliable
//! transport and are dropped. A silent receive window hands control to the
//! [`RegistrationClient`] so the producer keeps (or resumes) sending.
//!
//! ```text
//!          ┌──────── timeout T ────────┐
//!          │                           ▼
//!  recv_from ── Ok(bytes) ── decode ── set()     on_timeout() → "register"
//!          │                   │
//!          │                   └─ Err → warn, drop
//!          └── cancelled → exit, release socket
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::config::{DEFAULT_BUFFER_SIZE, DEFAULT_RECV_TIMEOUT_MS};
use crate::error::RelayError;
use crate::metrics::RelayMetrics;
use crate::registration::RegistrationClient;
use crate::snapshot::SnapshotStore;

/// Bytes of a rejected payload included in the warning log.
const REJECTED_PREVIEW_BYTES: usize = 200;
/// Bytes of an accepted payload included in debug logs.
const RAW_PREVIEW_BYTES: usize = 100;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Receive buffer size; longer datagrams are truncated by the OS.
    pub buffer_size: usize,
    /// Silence window after which registration is re-sent.
    pub recv_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            recv_timeout: Duration::from_millis(DEFAULT_RECV_TIMEOUT_MS),
        }
    }
}

/// Totals for one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub registrations_sent: u64,
}

pub struct IngestLoop {
    socket: Arc<UdpSocket>,
    registration: RegistrationClient,
    store: Arc<SnapshotStore>,
    metrics: Arc<RelayMetrics>,
    config: IngestConfig,
}

impl IngestLoop {
    pub fn new(
        socket: Arc<UdpSocket>,
        endpoint: SocketAddr,
        store: Arc<SnapshotStore>,
        metrics: Arc<RelayMetrics>,
        config: IngestConfig,
    ) -> Self {
        let registration = RegistrationClient::new(Arc::clone(&socket), endpoint, Arc::clone(&metrics));
        Self {
            socket,
            registration,
            store,
            metrics,
            config,
        }
    }

    /// Register, then receive until `shutdown` fires or the transport fails.
    ///
    /// The socket is released when this returns, on either path.
    pub async fn run(self, shutdown: CancellationToken) -> Result<IngestStats, RelayError> {
        let mut stats = IngestStats::default();
        let mut buf = vec![0u8; self.config.buffer_size];

        info!(
            endpoint = %self.registration.endpoint(),
            buffer_size = self.config.buffer_size,
            recv_timeout_ms = self.config.recv_timeout.as_millis() as u64,
            "Registering with producer"
        );
        self.registration
            .register()
            .await
            .inspect_err(|e| error!(error = %e, "Initial registration failed"))?;
        stats.registrations_sent += 1;

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping ingest loop");
                    break;
                }
                res = tokio::time::timeout(self.config.recv_timeout, self.socket.recv_from(&mut buf)) => res,
            };

            match received {
                Err(_elapsed) => {
                    self.registration
                        .on_timeout()
                        .await
                        .inspect_err(|e| error!(error = %e, "Registration resend failed"))?;
                    stats.registrations_sent += 1;
                }
                Ok(Ok((len, source))) => {
                    stats.received += 1;
                    if self.ingest_datagram(&buf[..len], source) {
                        stats.accepted += 1;
                    } else {
                        stats.dropped += 1;
                    }
                }
                Ok(Err(e)) if is_unreachable(&e) => {
                    // ICMP port-unreachable from a previous send: producer not up yet.
                    debug!(error = %e, "Producer unreachable, waiting for next window");
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Datagram receive failed, stopping ingest loop");
                    return Err(RelayError::Transport(e));
                }
            }
        }

        info!(
            received = stats.received,
            accepted = stats.accepted,
            dropped = stats.dropped,
            "Datagram socket closed"
        );
        Ok(stats)
    }

    /// Decode and publish one datagram. Returns whether it was stored.
    fn ingest_datagram(&self, bytes: &[u8], source: SocketAddr) -> bool {
        self.metrics.record_received();
        debug!(
            bytes = bytes.len(),
            source = %source,
            raw = %codec::preview(bytes, RAW_PREVIEW_BYTES),
            "Datagram received"
        );

        match codec::decode(bytes) {
            Ok(value) => {
                let first = !self.store.has_data();
                self.store.set(value);
                self.metrics.record_accepted();
                if first {
                    info!(source = %source, "First snapshot received");
                } else {
                    debug!(source = %source, "Data updated");
                }
                true
            }
            Err(e) => {
                self.metrics.record_dropped();
                warn!(
                    error = %e,
                    source = %source,
                    raw = %codec::preview(bytes, REJECTED_PREVIEW_BYTES),
                    "Dropping undecodable datagram"
                );
                false
            }
        }
    }
}

fn is_unreachable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}
