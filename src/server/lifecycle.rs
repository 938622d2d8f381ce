//! Run a server until shutdown is requested, then drain with a deadline

use super::http::{serve, ServerError, ServerTimeouts};
use super::shutdown::shutdown_channel;
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Serve on a background task until `stop` resolves
///
/// After `stop` fires the listener stops accepting and in-flight requests
/// get `timeouts.shutdown` to finish. Returns `Ok` whether or not the
/// drain completed in time. Returns an error if the server dies first or
/// `stop` itself fails.
pub async fn run_until_shutdown<F>(
    listener: TcpListener,
    router: Router,
    timeouts: ServerTimeouts,
    stop: F,
) -> Result<(), ServerError>
where
    F: Future<Output = std::io::Result<&'static str>>,
{
    let (controller, signal) = shutdown_channel();
    let mut server = tokio::spawn(serve(listener, router, timeouts, signal));

    tokio::select! {
        result = &mut server => {
            let err = match result {
                Ok(Ok(())) => ServerError::Stopped,
                Ok(Err(e)) => ServerError::Serve(e),
                Err(e) => ServerError::Task(e),
            };
            error!(error = %err, "HTTP server exited unexpectedly");
            return Err(err);
        }
        received = stop => match received {
            Ok(name) => info!(signal = name, "Initiating graceful shutdown"),
            Err(e) => {
                error!(error = %e, "Failed to wait for shutdown signal");
                controller.shutdown();
                server.abort();
                return Err(ServerError::Signal(e));
            }
        }
    }

    controller.shutdown();

    match tokio::time::timeout(timeouts.shutdown, &mut server).await {
        Ok(Ok(Ok(()))) => info!("In-flight requests drained"),
        Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server failed while draining"),
        Ok(Err(e)) => warn!(error = %e, "HTTP server task failed while draining"),
        Err(_) => {
            warn!(
                deadline_secs = timeouts.shutdown.as_secs_f64(),
                "Shutdown deadline exceeded, dropping in-flight requests"
            );
            server.abort();
        }
    }

    info!("Shutting down");
    Ok(())
}
