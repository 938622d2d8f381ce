//! Request monitoring backed by a Prometheus registry

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Route label used when no route matched the request
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Per-service request metrics
///
/// Cheap to clone; all clones record into the same registry.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    registry: Registry,
    requests: IntCounterVec,
    latency: HistogramVec,
}

impl Monitor {
    /// Create a monitor whose metrics carry a constant `service` label
    pub fn new(service: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests handled")
                .const_label("service", service),
            &["route", "method", "status"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .const_label("service", service),
            &["route", "method"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            inner: Arc::new(MonitorInner {
                registry,
                requests,
                latency,
            }),
        })
    }

    pub fn observe(&self, route: &str, method: &str, status: u16, elapsed: Duration) {
        self.inner
            .requests
            .with_label_values(&[route, method, &status.to_string()])
            .inc();
        self.inner
            .latency
            .with_label_values(&[route, method])
            .observe(elapsed.as_secs_f64());
    }

    /// Number of requests recorded for a route/method/status triple
    pub fn request_count(&self, route: &str, method: &str, status: u16) -> u64 {
        self.inner
            .requests
            .with_label_values(&[route, method, &status.to_string()])
            .get()
    }

    /// Encode all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.inner.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Middleware recording count and latency of every request
pub(crate) async fn track(
    State(monitor): State<Monitor>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
    let method = request.method().as_str().to_owned();

    let started = Instant::now();
    let response = next.run(request).await;

    monitor.observe(&route, &method, response.status().as_u16(), started.elapsed());
    response
}
