//! Environment configuration for the reader and writer processes
//!
//! Configuration is read once at startup and never changes afterwards.
//! Unset variables fall back to defaults; malformed values are errors.

use std::path::PathBuf;
use thiserror::Error;

/// Default listen port for both processes
pub const DEFAULT_HTTP_PORT: &str = "8000";

/// Default file echoed by the reader
pub const DEFAULT_FILE: &str = "test.txt";

/// Default ConfigMap appended to by the writer
pub const DEFAULT_CONFIGMAP: &str = "test";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("HTTP_PORT must be a valid port number (0-65535), got '{0}'")]
    InvalidPort(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Settings shared by both processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    /// Emit a tracing span per request instead of the no-op tracer
    pub trace_requests: bool,
}

impl ServiceConfig {
    fn from_vars(var: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_port = var("HTTP_PORT").unwrap_or_else(|| DEFAULT_HTTP_PORT.to_string());
        let port = raw_port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(raw_port.clone()))?;

        let trace_requests = var("TRACE_REQUESTS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(ServiceConfig {
            port,
            trace_requests,
        })
    }
}

/// Reader process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    pub service: ServiceConfig,
    pub file: PathBuf,
}

impl ReaderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (tests pass a map)
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let service = ServiceConfig::from_vars(&var)?;
        let file = var("FILE").unwrap_or_else(|| DEFAULT_FILE.to_string());
        if file.is_empty() {
            return Err(ConfigError::Empty("FILE"));
        }

        Ok(ReaderConfig {
            service,
            file: PathBuf::from(file),
        })
    }

    pub fn log_startup(&self) {
        tracing::info!(
            port = self.service.port,
            file = %self.file.display(),
            trace_requests = self.service.trace_requests,
            "Reader configuration loaded"
        );
    }
}

/// Writer process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    pub service: ServiceConfig,
    pub configmap: String,
}

impl WriterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (tests pass a map)
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let service = ServiceConfig::from_vars(&var)?;
        let configmap = var("CONFIGMAP").unwrap_or_else(|| DEFAULT_CONFIGMAP.to_string());
        if configmap.is_empty() {
            return Err(ConfigError::Empty("CONFIGMAP"));
        }

        Ok(WriterConfig { service, configmap })
    }

    pub fn log_startup(&self) {
        tracing::info!(
            port = self.service.port,
            configmap = %self.configmap,
            trace_requests = self.service.trace_requests,
            "Writer configuration loaded"
        );
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
