//! API scaffold shared by the reader and writer
//!
//! Owns the router, the request monitor and the tracer. Blueprints add
//! their routes through [`Api::register_blueprints`]; [`Api::handler`]
//! returns the final router with request timeouts, monitoring and tracing
//! layers applied. Timeouts sit inside the monitor so a 408 is counted.
//!
//! Built-in endpoints:
//! - `GET /api/v0/status` - liveness and service name
//! - `GET /api/v0/metrics` - Prometheus metrics in text format

mod monitor;
mod status;
mod tracer;

pub use monitor::{Monitor, UNMATCHED_ROUTE};
pub use status::{StatusResponse, METRICS_PATH, STATUS_PATH};
pub use tracer::Tracer;

use crate::server::ServerTimeouts;
use axum::{http::StatusCode, middleware, routing::get, Router};
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};

/// A bundle of routes plus the state they close over
///
/// Implementors attach their state to each route before returning the
/// router, so the scaffold never needs to know the blueprint's state type.
pub trait Blueprint {
    fn routes(&self, router: Router) -> Router;
}

/// Everything the scaffold needs to build an [`Api`]
#[derive(Clone)]
pub struct ApiConfig {
    pub name: String,
    pub tracer: Tracer,
    pub monitor: Monitor,
}

impl ApiConfig {
    pub fn new(name: impl Into<String>, tracer: Tracer, monitor: Monitor) -> Self {
        Self {
            name: name.into(),
            tracer,
            monitor,
        }
    }
}

pub struct Api {
    name: String,
    tracer: Tracer,
    monitor: Monitor,
    router: Router,
}

impl Api {
    pub fn new(config: ApiConfig) -> Self {
        let router = Router::new()
            .route(
                STATUS_PATH,
                get(status::status).with_state(config.name.clone()),
            )
            .route(
                METRICS_PATH,
                get(status::metrics).with_state(config.monitor.clone()),
            );

        Self {
            name: config.name,
            tracer: config.tracer,
            monitor: config.monitor,
            router,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Merge the routes of each blueprint into the router
    pub fn register_blueprints(mut self, blueprints: &[&dyn Blueprint]) -> Self {
        for blueprint in blueprints {
            self.router = blueprint.routes(self.router);
        }
        self
    }

    /// Final router with timeouts, monitoring and tracing on every route
    ///
    /// A response slower than `timeouts.write` becomes a 408; a body that
    /// takes longer than `timeouts.read` to arrive fails to read.
    pub fn handler(self, timeouts: ServerTimeouts) -> Router {
        let router = self
            .router
            .layer(RequestBodyTimeoutLayer::new(timeouts.read))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeouts.write,
            ))
            .layer(middleware::from_fn_with_state(self.monitor, monitor::track));
        self.tracer.apply(router)
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
