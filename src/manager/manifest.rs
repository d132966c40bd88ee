//! CronJob manifest synthesis
//!
//! Turns one declared job plus the global suspend flag and the manager's
//! identity into a concrete `batch/v1` CronJob body. The declared
//! `jobTemplate` stays an opaque JSON document until the very end, so
//! anything the declaration carries is passed through untouched apart from
//! the injected pod-level `app` label.

use crate::crds::ManagedJob;
use crate::manager::types::{
    Error, ManagerIdentity, Result, APP_LABEL_KEY, CONCURRENCY_POLICY, FAILED_JOBS_HISTORY_LIMIT,
    MANAGER_LABEL_KEY, SUCCESSFUL_JOBS_HISTORY_LIMIT,
};
use k8s_openapi::api::batch::v1::CronJob;
use serde_json::{json, Map, Value};

fn invalid(job: &ManagedJob, reason: impl Into<String>) -> Error {
    Error::InvalidJobTemplate {
        namespace: job.namespace.clone(),
        name: job.name.clone(),
        reason: reason.into(),
    }
}

/// Descend one level into the template, creating the object if absent.
fn ensure_object<'a>(
    map: &'a mut Map<String, Value>,
    key: &'static str,
    job: &ManagedJob,
) -> Result<&'a mut Map<String, Value>> {
    map.entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| invalid(job, format!("`{key}` is not an object")))
}

/// Synthesize the child CronJob body for one declared job.
///
/// Policy fields are forced regardless of anything in the input template:
/// concurrency is always `Forbid`, history retention is always 1/1, and
/// `spec.suspend` is exactly the global flag (the kill switch) — a suspend
/// value declared inside the template is silently overridden.
pub fn synthesize(
    job: &ManagedJob,
    global_suspend: bool,
    identity: &ManagerIdentity,
) -> Result<CronJob> {
    let mut template = job
        .job_template
        .clone()
        .unwrap_or_else(|| Value::Object(Map::new()));

    // Inject the pod-level `app` label, preserving whatever labels the
    // declaration already carries.
    let root = template
        .as_object_mut()
        .ok_or_else(|| invalid(job, "jobTemplate is not an object"))?;
    let spec = ensure_object(root, "spec", job)?;
    let pod_template = ensure_object(spec, "template", job)?;
    let pod_metadata = ensure_object(pod_template, "metadata", job)?;
    let pod_labels = ensure_object(pod_metadata, "labels", job)?;
    pod_labels.insert(APP_LABEL_KEY.to_string(), Value::String(job.name.clone()));

    let manifest = json!({
        "apiVersion": "batch/v1",
        "kind": "CronJob",
        "metadata": {
            "name": job.name,
            "namespace": job.namespace,
            "labels": {
                MANAGER_LABEL_KEY: identity.as_str(),
                APP_LABEL_KEY: job.name,
            },
        },
        "spec": {
            "schedule": job.schedule,
            "suspend": global_suspend,
            "jobTemplate": template,
            "concurrencyPolicy": CONCURRENCY_POLICY,
            "successfulJobsHistoryLimit": SUCCESSFUL_JOBS_HISTORY_LIMIT,
            "failedJobsHistoryLimit": FAILED_JOBS_HISTORY_LIMIT,
        },
    });

    serde_json::from_value(manifest).map_err(Error::SerializationError)
}
