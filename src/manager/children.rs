//! Cluster adapter for child CronJob operations
//!
//! The reconciler only talks to the cluster through [`ChildApi`], which keeps
//! the not-found signal explicit (create-vs-patch in converge, already-gone
//! in prune) and lets tests drive the reconciler against a mock.

use crate::manager::types::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::CronJob;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};

/// Result of a delete attempt; a 404 means a concurrent actor or an earlier
/// partial prune already removed the child, which counts as success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyGone,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChildApi: Send + Sync {
    /// Read one child; `None` is the not-present signal.
    async fn read(&self, namespace: &str, name: &str) -> Result<Option<CronJob>>;

    /// Create a child from a synthesized manifest.
    async fn create(&self, namespace: &str, manifest: &CronJob) -> Result<()>;

    /// Merge-patch a synthesized manifest onto an existing child.
    async fn patch(&self, namespace: &str, name: &str, manifest: &CronJob) -> Result<()>;

    /// List children across all reachable namespaces by label selector.
    async fn list(&self, label_selector: &str) -> Result<Vec<CronJob>>;

    /// Delete one child.
    async fn delete(&self, namespace: &str, name: &str) -> Result<DeleteOutcome>;
}

/// Production adapter backed by the kube client
#[derive(Clone)]
pub struct KubeChildren {
    client: Client,
}

impl KubeChildren {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced(&self, namespace: &str) -> Api<CronJob> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ChildApi for KubeChildren {
    async fn read(&self, namespace: &str, name: &str) -> Result<Option<CronJob>> {
        self.namespaced(namespace)
            .get_opt(name)
            .await
            .map_err(Error::KubeError)
    }

    async fn create(&self, namespace: &str, manifest: &CronJob) -> Result<()> {
        self.namespaced(namespace)
            .create(&PostParams::default(), manifest)
            .await?;
        Ok(())
    }

    async fn patch(&self, namespace: &str, name: &str, manifest: &CronJob) -> Result<()> {
        self.namespaced(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(manifest))
            .await?;
        Ok(())
    }

    async fn list(&self, label_selector: &str) -> Result<Vec<CronJob>> {
        let api: Api<CronJob> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(list.items)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<DeleteOutcome> {
        match self
            .namespaced(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(DeleteOutcome::AlreadyGone),
            Err(e) => Err(Error::KubeError(e)),
        }
    }
}
