//! Writer blueprint: append a sonar line to a ConfigMap
//!
//! ## Endpoints
//! - GET /api/v0/sonar - 200 with empty body on success,
//!   400 with `{"sonar": "<error>"}` on fetch or update failure
//!
//! Each request reads the ConfigMap, appends `\nsonar-<second>` to the
//! `file.txt` entry and writes the whole object back. The read-modify-write
//! is not transactional and conflicts are not retried.

use crate::api::Blueprint;
use super::clock::{Clock, SystemClock};
use super::configmap::ConfigMapStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Timelike;
use k8s_openapi::api::core::v1::ConfigMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const SONAR_PATH: &str = "/api/v0/sonar";

/// ConfigMap entry the sonar lines accumulate in
pub const DATA_KEY: &str = "file.txt";

#[derive(Debug, Error)]
pub enum SonarError {
    #[error("configmaps \"{0}\" not found")]
    NotFound(String),

    /// Stale write; holds the API server's message as sent
    #[error("{0}")]
    Conflict(String),

    #[error("ConfigMap missing name in metadata")]
    MissingName,

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SonarResponse {
    pub sonar: String,
}

#[derive(Clone)]
pub struct SonarBlueprint {
    configmap: Arc<str>,
    store: Arc<dyn ConfigMapStore>,
    clock: Arc<dyn Clock>,
}

impl SonarBlueprint {
    pub fn new(configmap: impl Into<String>, store: impl ConfigMapStore + 'static) -> Self {
        Self::with_clock(configmap, Arc::new(store), Arc::new(SystemClock))
    }

    pub fn with_clock(
        configmap: impl Into<String>,
        store: Arc<dyn ConfigMapStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            configmap: Arc::from(configmap.into()),
            store,
            clock,
        }
    }

    pub fn configmap(&self) -> &str {
        &self.configmap
    }

    /// Fetch, append one sonar line, write back
    pub async fn ping(&self) -> Result<(), SonarError> {
        let mut configmap = self.store.get(&self.configmap).await?;

        let second = self.clock.now().second();
        append_sonar_line(&mut configmap, second);

        self.store.update(&configmap).await?;
        info!(configmap = %self.configmap, second, "Sonar line appended");
        Ok(())
    }
}

/// Append `\nsonar-<second>` to the `file.txt` entry, creating it if absent
pub fn append_sonar_line(configmap: &mut ConfigMap, second: u32) {
    let data = configmap.data.get_or_insert_with(Default::default);
    let entry = data.entry(DATA_KEY.to_string()).or_default();
    entry.push_str(&format!("\nsonar-{}", second));
}

impl Blueprint for SonarBlueprint {
    fn routes(&self, router: Router) -> Router {
        router.route(SONAR_PATH, get(sonar).with_state(self.clone()))
    }
}

async fn sonar(State(blueprint): State<SonarBlueprint>) -> Response {
    match blueprint.ping().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!(configmap = %blueprint.configmap, error = %e, "Sonar failed");
            (
                StatusCode::BAD_REQUEST,
                Json(SonarResponse {
                    sonar: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
#[path = "sonar_test.rs"]
mod tests;
