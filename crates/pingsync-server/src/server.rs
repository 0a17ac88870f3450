//! HTTP listener and background maintenance
//!
//! Accepts connections until the shutdown token fires. Each connection is
//! served on its own task with the peer address passed to the routes for
//! rate limiting.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::routes;
use crate::state::AppState;

/// Shortest interval between cache sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// HTTP server bound to `server.bind`
pub struct HttpServer {
    state: Arc<AppState>,
    listener: TcpListener,
}

impl HttpServer {
    /// Bind the listener; port 0 picks a free port
    pub async fn bind(state: Arc<AppState>) -> anyhow::Result<Self> {
        let addr: SocketAddr = state
            .config
            .server
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address {}", state.config.server.bind))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        Ok(Self { state, listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `state.shutdown` is cancelled
    pub async fn run(self) -> anyhow::Result<()> {
        let shutdown = self.state.shutdown.clone();
        info!(addr = %self.local_addr()?, "pingsync server listening");

        let sweeper = tokio::spawn(sweep_loop(Arc::clone(&self.state)));

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let state = Arc::clone(&self.state);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move {
                                Ok::<_, Infallible>(routes::handle(req, state, peer.ip()).await)
                            }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!(error = %e, %peer, "HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        let running = self.state.jobs.cancel_all();
        if running > 0 {
            info!(running, "Cancelled running jobs");
        }
        if let Err(e) = sweeper.await {
            error!(error = %e, "Sweep task failed");
        }
        Ok(())
    }
}

/// Periodically drop expired tokens and idle rate-limit entries
async fn sweep_loop(state: Arc<AppState>) {
    let period = state
        .config
        .token_cache
        .sweep_interval()
        .max(MIN_SWEEP_INTERVAL);
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let purged = state.services.tokens.purge_expired();
                state.limits.retain_recent();
                if purged > 0 {
                    debug!(purged, "Purged expired tokens");
                }
            }
            _ = state.shutdown.cancelled() => break,
        }
    }
}

/// Cancel `token` on SIGINT or SIGTERM
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
