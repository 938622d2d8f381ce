//! Listener setup and the axum serve loop

use super::conn::TimeoutListener;
use super::shutdown::ShutdownSignal;
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("HTTP server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),

    #[error("HTTP server stopped before shutdown was requested")]
    Stopped,
}

/// Per-connection and per-request time limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimeouts {
    /// Limit on receiving a request head, and separately its body
    pub read: Duration,
    /// Limit on producing a response (408 when exceeded)
    pub write: Duration,
    /// Connections with no traffic for this long are closed
    pub idle: Duration,
    /// Drain window for in-flight requests after shutdown starts
    pub shutdown: Duration,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(15),
            write: Duration::from_secs(15),
            idle: Duration::from_secs(60),
            shutdown: Duration::from_secs(15),
        }
    }
}

/// Bind `0.0.0.0:<port>`
pub async fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    // Log after successful bind - server is actually listening
    info!(port = %port, "HTTP server listening");
    Ok(listener)
}

/// Serve `router` until `shutdown` fires and every connection has closed
///
/// Connections get the head-read and idle limits from `timeouts`; the
/// per-request limits belong to the router (see `Api::handler`).
/// Returns once the drain completes; the caller bounds how long it waits.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    timeouts: ServerTimeouts,
    mut shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    let listener = TimeoutListener::new(listener, timeouts.read, timeouts.idle);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
