//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::ingestion::IngestConfig;

pub const DEFAULT_PRODUCER_PORT: u16 = 5005;
pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("receive timeout must be greater than zero")]
    InvalidTimeout,

    #[error("buffer size {0} outside 1..=65535")]
    InvalidBufferSize(usize),

    #[error("perturbation bound {0} must be finite and non-negative")]
    InvalidPerturbBound(f64),

    #[error("could not resolve producer address {0}")]
    UnresolvedHost(String),
}

/// Relay runtime configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "udp-relay")]
#[command(about = "Relay the latest UDP JSON payload to HTTP pollers")]
pub struct RelayConfig {
    /// Host of the UDP producer
    #[arg(long, env = "RELAY_PRODUCER_HOST", default_value = "127.0.0.1")]
    pub producer_host: String,

    /// Port of the UDP producer
    #[arg(long, env = "RELAY_PRODUCER_PORT", default_value_t = DEFAULT_PRODUCER_PORT)]
    pub producer_port: u16,

    /// Local address for the datagram socket
    #[arg(long, env = "RELAY_BIND_ADDR", default_value = "0.0.0.0:0")]
    pub bind_addr: SocketAddr,

    /// Port for the HTTP polling server
    #[arg(long, env = "RELAY_HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Receive buffer size in bytes
    #[arg(long, env = "RELAY_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Silence window before registration is re-sent, in milliseconds
    #[arg(long, env = "RELAY_RECV_TIMEOUT_MS", default_value_t = DEFAULT_RECV_TIMEOUT_MS)]
    pub recv_timeout_ms: u64,

    /// Perturb numeric leaves of served snapshots by up to this amount
    #[arg(long, env = "RELAY_PERTURB", value_name = "BOUND")]
    pub perturb: Option<f64>,

    /// Seed for the perturbation RNG
    #[arg(long, env = "RELAY_SEED")]
    pub seed: Option<u64>,

    /// Serve the viewer page from this file instead of the built-in one
    #[arg(long, env = "RELAY_PAGE", value_name = "PATH")]
    pub page: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            producer_host: "127.0.0.1".to_string(),
            producer_port: DEFAULT_PRODUCER_PORT,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            http_port: DEFAULT_HTTP_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            recv_timeout_ms: DEFAULT_RECV_TIMEOUT_MS,
            perturb: None,
            seed: None,
            page: None,
            verbose: false,
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recv_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.buffer_size == 0 || self.buffer_size > 65_535 {
            return Err(ConfigError::InvalidBufferSize(self.buffer_size));
        }
        if let Some(bound) = self.perturb {
            if !bound.is_finite() || bound < 0.0 {
                return Err(ConfigError::InvalidPerturbBound(bound));
            }
        }
        Ok(())
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            buffer_size: self.buffer_size,
            recv_timeout: self.recv_timeout(),
        }
    }

    /// Resolve the producer endpoint. The first resolved address wins.
    pub async fn producer_endpoint(&self) -> Result<SocketAddr, ConfigError> {
        let target = format!("{}:{}", self.producer_host, self.producer_port);
        tokio::net::lookup_host(&target)
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(ConfigError::UnresolvedHost(target))
    }
}
