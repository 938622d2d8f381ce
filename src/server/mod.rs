//! HTTP listener lifecycle
//!
//! - Binds `0.0.0.0:<port>` and serves a router with per-connection
//!   head-read and idle limits
//! - Waits for SIGTERM/SIGINT, stops accepting, drains in-flight requests
//!   for a bounded time, then returns

mod conn;
mod http;
mod lifecycle;
pub mod shutdown;

pub use conn::{TimeoutListener, TimeoutStream};
pub use http::{bind, serve, ServerError, ServerTimeouts};
pub use lifecycle::run_until_shutdown;
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};

#[cfg(test)]
#[path = "server_test.rs"]
mod server_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
