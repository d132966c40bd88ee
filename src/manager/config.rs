//! Manager controller configuration
//!
//! Small configuration surface loaded from a mounted YAML file. The
//! reconciliation policy itself (labels, concurrency, history retention) is
//! fixed and deliberately not configurable.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Main controller configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Restrict the CronJobManager watch to one namespace; unset watches all
    /// namespaces the service account can see
    #[serde(default, rename = "watchNamespace")]
    pub watch_namespace: Option<String>,

    /// Bind address for the health/readiness HTTP server
    #[serde(default = "default_http_bind", rename = "httpBind")]
    pub http_bind: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            http_bind: default_http_bind(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a mounted file path
    pub fn from_mounted_file(config_path: &str) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {config_path}: {e}"))?;

        let config: ControllerConfig = serde_yaml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))?;

        Ok(config)
    }

    /// Validate configuration before the controller starts
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.http_bind.parse::<SocketAddr>().map_err(|e| {
            anyhow::anyhow!("httpBind '{}' is not a valid socket address: {e}", self.http_bind)
        })?;

        if let Some(namespace) = &self.watch_namespace {
            if namespace.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "watchNamespace must be non-empty when set; omit it to watch all namespaces"
                ));
            }
        }

        Ok(())
    }
}
