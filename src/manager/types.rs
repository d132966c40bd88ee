//! Shared types, constants and errors for the manager controller

use crate::crds::CronJobManager;
use crate::manager::children::ChildApi;
use crate::manager::config::ControllerConfig;
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Label key stamped on every child CronJob; its value is the owning
/// manager's identity token. Ownership is decided by this label alone,
/// never by naming convention.
pub const MANAGER_LABEL_KEY: &str = "batch.platform/manager";

/// Standard "app" label applied at both the CronJob and pod level
pub const APP_LABEL_KEY: &str = "app";

/// Concurrency policy forced onto every synthesized CronJob
pub const CONCURRENCY_POLICY: &str = "Forbid";

/// History retention forced onto every synthesized CronJob
pub const SUCCESSFUL_JOBS_HISTORY_LIMIT: i32 = 1;
pub const FAILED_JOBS_HISTORY_LIMIT: i32 = 1;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    #[error("Invalid jobTemplate for {namespace}/{name}: {reason}")]
    InvalidJobTemplate {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// Unique identity of a child CronJob, both as declared and as observed
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChildKey {
    pub namespace: String,
    pub name: String,
}

impl ChildKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Opaque ownership token derived from the manager's namespace and name.
/// Derived fresh from parent metadata on every reconcile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerIdentity(String);

impl ManagerIdentity {
    pub fn from_manager(manager: &CronJobManager) -> Result<Self> {
        let namespace = manager
            .namespace()
            .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        let name = manager
            .metadata
            .name
            .clone()
            .ok_or(Error::MissingObjectKey("metadata.name"))?;
        Ok(Self(format!("{namespace}_{name}")))
    }

    /// Label selector matching every child this manager owns
    pub fn label_selector(&self) -> String {
        format!("{MANAGER_LABEL_KEY}={}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManagerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared context handed to every reconcile invocation
pub struct Context {
    /// Cluster adapter for child CronJob operations
    pub children: Arc<dyn ChildApi>,
    /// Controller configuration loaded at startup
    pub config: Arc<ControllerConfig>,
}
