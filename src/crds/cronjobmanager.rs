//! `CronJobManager` Custom Resource Definition for declaring CronJob fleets

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default function for `global_suspend` field
fn default_global_suspend() -> bool {
    false
}

/// One scheduled job declared by a manager.
///
/// The (namespace, name) pair is the child CronJob's identity; `jobTemplate`
/// is carried opaquely and only interpreted by the manifest synthesizer.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct ManagedJob {
    /// Namespace the child CronJob is created in
    pub namespace: String,

    /// Name of the child CronJob
    pub name: String,

    /// Cron expression (e.g. "0 * * * *")
    pub schedule: String,

    /// Job template for the unit of work (batch/v1 JobTemplateSpec-shaped).
    /// Absent means an empty template.
    #[serde(default, rename = "jobTemplate", skip_serializing_if = "Option::is_none")]
    pub job_template: Option<serde_json::Value>,
}

/// `CronJobManager` CRD declaring a desired fleet of CronJobs plus a global
/// suspend kill switch
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(group = "batch.platform", version = "v1", kind = "CronJobManager")]
#[kube(namespaced)]
#[kube(printcolumn = r#"{"name":"Suspend","type":"boolean","jsonPath":".spec.globalSuspend"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
pub struct CronJobManagerSpec {
    /// Suspends every owned CronJob when true (overrides anything declared
    /// inside individual job templates)
    #[serde(default = "default_global_suspend", rename = "globalSuspend")]
    pub global_suspend: bool,

    /// Declared scheduled jobs; later entries win on duplicate
    /// (namespace, name) keys
    #[serde(default)]
    pub jobs: Vec<ManagedJob>,
}
