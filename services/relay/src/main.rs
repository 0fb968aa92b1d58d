use std::sync::Arc;

use clap::Parser;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::info;

use udp_relay::metrics::RelayMetrics;
use udp_relay::perturb::Jitter;
use udp_relay::{create_router, AppState, IngestLoop, RelayConfig, SnapshotStore};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = RelayConfig::parse();
    setup_tracing(config.verbose);
    config.validate()?;

    info!("Starting UDP relay");

    let endpoint = config.producer_endpoint().await?;
    let socket = Arc::new(UdpSocket::bind(config.bind_addr).await?);
    info!(local = %socket.local_addr()?, producer = %endpoint, "Datagram socket bound");

    let store = Arc::new(SnapshotStore::new());
    let metrics = Arc::new(RelayMetrics::new());

    let mut state = AppState::new(Arc::clone(&store), Arc::clone(&metrics));
    if let Some(bound) = config.perturb {
        let jitter = match config.seed {
            Some(seed) => Jitter::seeded(bound, seed),
            None => Jitter::new(bound),
        };
        info!(bound, "Perturbing served snapshots");
        state = state.with_transform(Arc::new(jitter));
    }
    if let Some(path) = config.page.clone() {
        state = state.with_page_path(path);
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let app = create_router(state);
    let addr = config.http_addr();
    let listener = TcpListener::bind(addr).await?;
    info!("Web server listening on http://{}", addr);

    let server = tokio::spawn({
        let stop = shutdown.clone().cancelled_owned();
        async move { axum::serve(listener, app).with_graceful_shutdown(stop).await }
    });

    let ingest = IngestLoop::new(socket, endpoint, store, metrics, config.ingest_config());
    let outcome = ingest.run(shutdown.clone()).await;

    // Ingest failure also stops the web server.
    shutdown.cancel();
    server.await??;

    let stats = outcome?;
    info!(
        received = stats.received,
        accepted = stats.accepted,
        dropped = stats.dropped,
        registrations = stats.registrations_sent,
        "Relay stopped"
    );
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
    shutdown.cancel();
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("udp_relay=debug,tower_http=debug")
        } else {
            EnvFilter::new("udp_relay=info,tower_http=info")
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
