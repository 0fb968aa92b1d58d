//! Registration / heartbeat side of the datagram protocol.
//!
//! The producer only sends to peers that have registered, and it forgets
//! peers on restart. The relay therefore re-sends its token every time a
//! full receive window passes in silence. Registration is never
//! acknowledged; silence is the only trigger.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::metrics::RelayMetrics;

/// Token sent to the producer to (re-)register.
pub const REGISTER_TOKEN: &[u8] = b"register";

/// Protocol state. Waiting for data is the only steady state; a timeout
/// fires a resend and stays here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    AwaitingData,
}

pub struct RegistrationClient {
    socket: Arc<UdpSocket>,
    endpoint: SocketAddr,
    token: Vec<u8>,
    sent: AtomicU64,
    metrics: Arc<RelayMetrics>,
}

impl RegistrationClient {
    pub fn new(socket: Arc<UdpSocket>, endpoint: SocketAddr, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            socket,
            endpoint,
            token: REGISTER_TOKEN.to_vec(),
            sent: AtomicU64::new(0),
            metrics,
        }
    }

    /// Send one registration datagram to the producer.
    pub async fn register(&self) -> io::Result<()> {
        self.socket.send_to(&self.token, self.endpoint).await?;
        let sent = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        self.metrics.record_registration();
        debug!(endpoint = %self.endpoint, sent, "Registration sent");
        Ok(())
    }

    /// A receive window elapsed with no datagram.
    pub async fn on_timeout(&self) -> io::Result<()> {
        info!(endpoint = %self.endpoint, "No data received, resending registration");
        self.register().await
    }

    pub fn state(&self) -> RegistrationState {
        RegistrationState::AwaitingData
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Total registrations sent so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}
