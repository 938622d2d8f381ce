//! ConfigMap access for the writer
//!
//! Production code uses `KubeConfigMaps`, a `kube::Api<ConfigMap>` scoped
//! to the `default` namespace. Tests use `MockConfigMaps`, an in-memory
//! store with no optimistic concurrency, so lost updates are observable.

use super::sonar::SonarError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, PostParams};
use tracing::debug;

pub const DEFAULT_NAMESPACE: &str = "default";

#[async_trait]
pub trait ConfigMapStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<ConfigMap, SonarError>;

    /// Replace the stored object with `configmap` as a whole
    async fn update(&self, configmap: &ConfigMap) -> Result<ConfigMap, SonarError>;
}

pub struct KubeConfigMaps {
    api: Api<ConfigMap>,
}

impl KubeConfigMaps {
    pub fn new(client: kube::Client) -> Self {
        Self {
            api: Api::namespaced(client, DEFAULT_NAMESPACE),
        }
    }
}

#[async_trait]
impl ConfigMapStore for KubeConfigMaps {
    async fn get(&self, name: &str) -> Result<ConfigMap, SonarError> {
        match self.api.get(name).await {
            Ok(configmap) => Ok(configmap),
            Err(kube::Error::Api(err)) if err.code == 404 => {
                Err(SonarError::NotFound(name.to_string()))
            }
            Err(e) => Err(SonarError::Kube(e)),
        }
    }

    async fn update(&self, configmap: &ConfigMap) -> Result<ConfigMap, SonarError> {
        let name = configmap
            .metadata
            .name
            .as_deref()
            .ok_or(SonarError::MissingName)?;

        // resourceVersion travels with the object, so a stale write is a 409
        let updated = self
            .api
            .replace(name, &PostParams::default(), configmap)
            .await
            .map_err(update_error)?;
        debug!(
            configmap = %name,
            resource_version = ?updated.metadata.resource_version,
            "ConfigMap replaced"
        );
        Ok(updated)
    }
}

/// Map a failed replace, passing a conflict's server message through as is
fn update_error(err: kube::Error) -> SonarError {
    match err {
        kube::Error::Api(err) if err.code == 409 => SonarError::Conflict(err.message),
        other => SonarError::Kube(other),
    }
}

/// In-memory ConfigMap store for testing
#[cfg(test)]
pub struct MockConfigMaps {
    configmaps: std::sync::Mutex<std::collections::BTreeMap<String, ConfigMap>>,
    updates: std::sync::atomic::AtomicUsize,
    fail_updates: bool,
    read_barrier: Option<tokio::sync::Barrier>,
}

#[cfg(test)]
impl Default for MockConfigMaps {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl MockConfigMaps {
    pub fn new() -> Self {
        Self {
            configmaps: std::sync::Mutex::new(std::collections::BTreeMap::new()),
            updates: std::sync::atomic::AtomicUsize::new(0),
            fail_updates: false,
            read_barrier: None,
        }
    }

    /// Store a ConfigMap with `file.txt` set to `contents`
    pub fn with_configmap(self, name: &str, contents: Option<&str>) -> Self {
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

        let configmap = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(DEFAULT_NAMESPACE.to_string()),
                ..Default::default()
            },
            data: contents.map(|c| {
                std::collections::BTreeMap::from([(
                    super::sonar::DATA_KEY.to_string(),
                    c.to_string(),
                )])
            }),
            ..Default::default()
        };
        self.configmaps
            .lock()
            .unwrap()
            .insert(name.to_string(), configmap);
        self
    }

    /// Reject every update with the API server's conflict message
    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    /// Hold every `get` until `readers` gets are in flight
    pub fn with_read_barrier(mut self, readers: usize) -> Self {
        self.read_barrier = Some(tokio::sync::Barrier::new(readers));
        self
    }

    pub fn data(&self, name: &str) -> Option<String> {
        self.configmaps
            .lock()
            .unwrap()
            .get(name)
            .and_then(|cm| cm.data.as_ref())
            .and_then(|data| data.get(super::sonar::DATA_KEY).cloned())
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[async_trait]
impl ConfigMapStore for MockConfigMaps {
    async fn get(&self, name: &str) -> Result<ConfigMap, SonarError> {
        let snapshot = self.configmaps.lock().unwrap().get(name).cloned();
        if let Some(barrier) = &self.read_barrier {
            barrier.wait().await;
        }
        snapshot.ok_or_else(|| SonarError::NotFound(name.to_string()))
    }

    async fn update(&self, configmap: &ConfigMap) -> Result<ConfigMap, SonarError> {
        let name = configmap
            .metadata
            .name
            .clone()
            .ok_or(SonarError::MissingName)?;
        if self.fail_updates {
            return Err(SonarError::Conflict(conflict_message(&name)));
        }
        self.updates
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.configmaps
            .lock()
            .unwrap()
            .insert(name, configmap.clone());
        Ok(configmap.clone())
    }
}

/// Message the API server sends with a 409 on a stale replace
#[cfg(test)]
pub fn conflict_message(name: &str) -> String {
    format!(
        "Operation cannot be fulfilled on configmaps \"{}\": the object has been modified; \
         please apply your changes to the latest version and try again",
        name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_conflict_keeps_server_message() {
        let message = conflict_message("test");

        let err = update_error(api_error(409, "Conflict", &message));

        assert!(matches!(err, SonarError::Conflict(_)));
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_conflict_message_is_not_rewritten() {
        let err = update_error(api_error(409, "Conflict", "etcd says no"));
        assert_eq!(err.to_string(), "etcd says no");
    }

    #[test]
    fn test_other_api_errors_pass_through() {
        let err = update_error(api_error(422, "Invalid", "data too long"));
        assert!(matches!(err, SonarError::Kube(kube::Error::Api(ref e)) if e.code == 422));
    }
}
