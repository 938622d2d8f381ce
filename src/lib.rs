//! Reader and writer demo services
//!
//! Two single-route HTTP services sharing one bootstrap:
//! - `reader` echoes a local file on `GET /api/v0/echo`
//! - `writer` appends a `sonar-<second>` line to a ConfigMap on `GET /api/v0/sonar`

pub mod api;
pub mod blueprint;
pub mod bootstrap;
pub mod config;
pub mod server;
