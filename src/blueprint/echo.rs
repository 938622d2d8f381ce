//! Reader blueprint: echo a local file over HTTP
//!
//! ## Endpoints
//! - GET /api/v0/echo - `{"echo": "<file contents>"}`
//!
//! The file is re-read on every request, so edits show up immediately.
//! A read failure is reported in the `echo` field with status 200.

use crate::api::Blueprint;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub const ECHO_PATH: &str = "/api/v0/echo";

#[derive(Debug, Error)]
pub enum EchoError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EchoResponse {
    pub echo: String,
}

/// Holds the path only; the file is opened per request
#[derive(Debug, Clone)]
pub struct EchoBlueprint {
    path: Arc<PathBuf>,
}

impl EchoBlueprint {
    /// Check once that `path` can be opened, then keep the path
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, EchoError> {
        let path = path.into();
        std::fs::File::open(&path).map_err(|source| EchoError::Open {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file contents, or the read error text
    pub async fn read(&self) -> String {
        match tokio::fs::read(self.path.as_path()).await {
            Ok(bytes) => {
                debug!(path = %self.path.display(), bytes = bytes.len(), "File echoed");
                String::from_utf8_lossy(&bytes).into_owned()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read echo file");
                e.to_string()
            }
        }
    }
}

impl Blueprint for EchoBlueprint {
    fn routes(&self, router: Router) -> Router {
        router.route(ECHO_PATH, get(echo).with_state(self.clone()))
    }
}

async fn echo(State(blueprint): State<EchoBlueprint>) -> Json<EchoResponse> {
    Json(EchoResponse {
        echo: blueprint.read().await,
    })
}

#[cfg(test)]
#[path = "echo_test.rs"]
mod tests;
