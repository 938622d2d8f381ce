//! Request tracing
//!
//! Distributed trace export is out of scope. The default tracer is a
//! no-op; `Spans` wraps each request in a `tracing` span so request
//! lifecycles show up in the process logs.

use axum::Router;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tracer {
    #[default]
    Noop,
    Spans,
}

impl Tracer {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Tracer::Spans
        } else {
            Tracer::Noop
        }
    }

    pub(crate) fn apply(self, router: Router) -> Router {
        match self {
            Tracer::Noop => router,
            Tracer::Spans => router.layer(TraceLayer::new_for_http()),
        }
    }
}
