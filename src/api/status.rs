//! Built-in status and metrics endpoints

use super::Monitor;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

pub const STATUS_PATH: &str = "/api/v0/status";
pub const METRICS_PATH: &str = "/api/v0/metrics";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
    pub name: String,
}

/// Liveness handler
///
/// Always returns 200 OK - if this responds, the process is alive.
pub(super) async fn status(State(name): State<String>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        name,
    })
}

/// Prometheus metrics handler
pub(super) async fn metrics(State(monitor): State<Monitor>) -> impl IntoResponse {
    match monitor.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}
