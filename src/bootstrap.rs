//! Process bootstrap shared by the `reader` and `writer` binaries

use crate::api::{Api, ApiConfig, Monitor, Tracer};
use crate::config::ServiceConfig;
use crate::server::{self, ServerError, ServerTimeouts};
use axum::Router;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Install the global log subscriber (`RUST_LOG`, default `info`)
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Monitor, tracer and API for a service named `name`
pub fn build_api(name: &str, service: &ServiceConfig) -> Result<Api, prometheus::Error> {
    let monitor = Monitor::new(name)?;
    let tracer = Tracer::from_flag(service.trace_requests);
    Ok(Api::new(ApiConfig::new(name, tracer, monitor)))
}

/// Bind the configured port and serve until SIGTERM/SIGINT
///
/// `timeouts` should be the ones the router was built with.
pub async fn serve_until_signal(
    router: Router,
    service: &ServiceConfig,
    timeouts: ServerTimeouts,
) -> Result<(), ServerError> {
    let listener = server::bind(service.port).await.inspect_err(|e| {
        error!(error = %e, "Failed to start HTTP server");
    })?;

    server::run_until_shutdown(
        listener,
        router,
        timeouts,
        server::wait_for_signal(),
    )
    .await
}
