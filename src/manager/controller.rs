//! Reconciliation of one `CronJobManager` against live cluster state
//!
//! Two ordered phases per invocation: converge (create-or-patch every
//! desired child) then prune (delete owned children no longer declared).
//! Per-item adapter failures are contained and logged so one bad child never
//! blocks the rest; resilience comes from the next triggered reconcile, not
//! from in-loop retries.

use crate::crds::CronJobManager;
use crate::manager::children::{ChildApi, DeleteOutcome};
use crate::manager::desired::{build_desired_state, DesiredState};
use crate::manager::manifest::synthesize;
use crate::manager::types::{ChildKey, Context, ManagerIdentity, Result};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[instrument(skip(ctx), fields(manager_name = %manager.name_any()))]
pub async fn reconcile_cron_job_manager(
    manager: Arc<CronJobManager>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let name = manager.name_any();
    info!("Reconciling CronJobManager: {}", name);

    // Identity and desired state are rebuilt from the parent on every pass;
    // nothing carries over between invocations.
    let identity = ManagerIdentity::from_manager(&manager)?;
    let desired = build_desired_state(&manager.spec);

    info!(
        "Desired state: {} cronjob(s), globalSuspend={}",
        desired.len(),
        manager.spec.global_suspend
    );

    converge(
        &desired,
        manager.spec.global_suspend,
        &identity,
        ctx.children.as_ref(),
    )
    .await?;

    // Prune runs even when individual converge items failed.
    prune(&desired, &identity, ctx.children.as_ref()).await;

    info!("Reconciliation complete for '{}'", name);
    Ok(Action::await_change())
}

/// Phase 1: create or merge-patch every desired child.
///
/// Adapter failures are logged per key and never abort the loop. Manifest
/// synthesis failures propagate: a malformed declaration is a contract
/// violation, not a cluster transient.
async fn converge(
    desired: &DesiredState,
    global_suspend: bool,
    identity: &ManagerIdentity,
    children: &dyn ChildApi,
) -> Result<()> {
    for (key, job) in desired {
        let manifest = synthesize(job, global_suspend, identity)?;

        match children.read(&key.namespace, &key.name).await {
            Ok(Some(_)) => {
                info!("Patching CronJob '{}'...", key);
                if let Err(e) = children.patch(&key.namespace, &key.name, &manifest).await {
                    error!("Failed to patch CronJob '{}': {}", key, e);
                }
            }
            Ok(None) => {
                info!("Creating CronJob '{}'...", key);
                if let Err(e) = children.create(&key.namespace, &manifest).await {
                    error!("Failed to create CronJob '{}': {}", key, e);
                }
            }
            Err(e) => {
                error!("Failed to read CronJob '{}': {}", key, e);
            }
        }
    }
    Ok(())
}

/// Phase 2: delete owned children that are no longer declared.
///
/// A listing failure aborts only this phase; the next trigger retries the
/// full prune. Deleting a child that is already gone counts as success.
async fn prune(desired: &DesiredState, identity: &ManagerIdentity, children: &dyn ChildApi) {
    info!("Checking for orphaned cronjobs...");

    let observed = match children.list(&identity.label_selector()).await {
        Ok(observed) => observed,
        Err(e) => {
            error!(
                "Failed to list owned cronjobs, deferring prune to next reconcile: {}",
                e
            );
            return;
        }
    };

    let observed_keys: BTreeSet<ChildKey> = observed
        .iter()
        .filter_map(|child| {
            Some(ChildKey::new(
                child.metadata.namespace.clone()?,
                child.metadata.name.clone()?,
            ))
        })
        .collect();

    let orphans: Vec<ChildKey> = observed_keys
        .into_iter()
        .filter(|key| !desired.contains_key(key))
        .collect();

    if orphans.is_empty() {
        info!("No orphaned cronjobs found");
        return;
    }

    info!("Found {} orphaned cronjob(s) to delete", orphans.len());

    for key in orphans {
        match children.delete(&key.namespace, &key.name).await {
            Ok(DeleteOutcome::Deleted) => {
                info!("Deleted orphaned CronJob '{}'", key);
            }
            Ok(DeleteOutcome::AlreadyGone) => {
                warn!("Orphaned CronJob '{}' already deleted", key);
            }
            Err(e) => {
                error!("Failed to delete orphaned CronJob '{}': {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::{CronJobManagerSpec, ManagedJob};
    use crate::manager::children::MockChildApi;
    use crate::manager::config::ControllerConfig;
    use crate::manager::types::{Error, MANAGER_LABEL_KEY};
    use k8s_openapi::api::batch::v1::CronJob;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn manager(global_suspend: bool, jobs: Vec<ManagedJob>) -> Arc<CronJobManager> {
        let mut manager = CronJobManager::new(
            "fleet",
            CronJobManagerSpec {
                global_suspend,
                jobs,
            },
        );
        manager.metadata.namespace = Some("ops".to_string());
        Arc::new(manager)
    }

    fn job(namespace: &str, name: &str) -> ManagedJob {
        ManagedJob {
            namespace: namespace.to_string(),
            name: name.to_string(),
            schedule: "0 * * * *".to_string(),
            job_template: None,
        }
    }

    fn owned_child(namespace: &str, name: &str) -> CronJob {
        let labels: BTreeMap<String, String> = [
            (MANAGER_LABEL_KEY.to_string(), "ops_fleet".to_string()),
            ("app".to_string(), name.to_string()),
        ]
        .into_iter()
        .collect();

        CronJob {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn context(mock: MockChildApi) -> Arc<Context> {
        Arc::new(Context {
            children: Arc::new(mock),
            config: Arc::new(ControllerConfig::default()),
        })
    }

    fn transient() -> Error {
        Error::KubeError(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "the server is currently unable to handle the request".to_string(),
            reason: "ServiceUnavailable".to_string(),
            code: 503,
        }))
    }

    #[tokio::test]
    async fn missing_child_is_created() {
        let mut mock = MockChildApi::new();
        mock.expect_read()
            .withf(|ns, name| ns == "batch" && name == "cleanup")
            .once()
            .returning(|_, _| Ok(None));
        mock.expect_create()
            .withf(|ns, manifest: &CronJob| {
                let labels = manifest.metadata.labels.as_ref().unwrap();
                ns == "batch" && labels[MANAGER_LABEL_KEY] == "ops_fleet"
            })
            .once()
            .returning(|_, _| Ok(()));
        mock.expect_patch().never();
        mock.expect_list().once().returning(|_| Ok(vec![]));
        mock.expect_delete().never();

        let result =
            reconcile_cron_job_manager(manager(false, vec![job("batch", "cleanup")]), context(mock))
                .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn existing_child_is_merge_patched() {
        let mut mock = MockChildApi::new();
        mock.expect_read()
            .once()
            .returning(|_, _| Ok(Some(owned_child("batch", "cleanup"))));
        mock.expect_patch()
            .withf(|ns, name, _| ns == "batch" && name == "cleanup")
            .once()
            .returning(|_, _, _| Ok(()));
        mock.expect_create().never();
        mock.expect_list()
            .once()
            .returning(|_| Ok(vec![owned_child("batch", "cleanup")]));
        mock.expect_delete().never();

        let result =
            reconcile_cron_job_manager(manager(false, vec![job("batch", "cleanup")]), context(mock))
                .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn kill_switch_flips_suspend_on_patched_children() {
        let mut mock = MockChildApi::new();
        mock.expect_read()
            .once()
            .returning(|_, _| Ok(Some(owned_child("batch", "cleanup"))));
        mock.expect_patch()
            .withf(|_, _, manifest: &CronJob| {
                manifest.spec.as_ref().unwrap().suspend == Some(true)
            })
            .once()
            .returning(|_, _, _| Ok(()));
        mock.expect_list()
            .once()
            .returning(|_| Ok(vec![owned_child("batch", "cleanup")]));

        let result =
            reconcile_cron_job_manager(manager(true, vec![job("batch", "cleanup")]), context(mock))
                .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn one_failing_child_does_not_block_the_rest() {
        let mut mock = MockChildApi::new();
        // First key (batch/a) fails on read; second (batch/b) converges.
        mock.expect_read()
            .withf(|_, name| name == "a")
            .once()
            .returning(|_, _| Err(transient()));
        mock.expect_read()
            .withf(|_, name| name == "b")
            .once()
            .returning(|_, _| Ok(None));
        mock.expect_create()
            .withf(|_, manifest: &CronJob| manifest.metadata.name.as_deref() == Some("b"))
            .once()
            .returning(|_, _| Ok(()));
        mock.expect_list().once().returning(|_| Ok(vec![]));

        let result = reconcile_cron_job_manager(
            manager(false, vec![job("batch", "a"), job("batch", "b")]),
            context(mock),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn orphans_are_deleted_during_prune() {
        let mut mock = MockChildApi::new();
        mock.expect_read().once().returning(|_, _| Ok(None));
        mock.expect_create().once().returning(|_, _| Ok(()));
        mock.expect_list()
            .withf(|selector| selector == "batch.platform/manager=ops_fleet")
            .once()
            .returning(|_| {
                Ok(vec![
                    owned_child("batch", "cleanup"),
                    owned_child("legacy", "stale"),
                ])
            });
        mock.expect_delete()
            .withf(|ns, name| ns == "legacy" && name == "stale")
            .once()
            .returning(|_, _| Ok(DeleteOutcome::Deleted));

        let result =
            reconcile_cron_job_manager(manager(false, vec![job("batch", "cleanup")]), context(mock))
                .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn already_deleted_orphan_counts_as_success() {
        let mut mock = MockChildApi::new();
        mock.expect_list()
            .once()
            .returning(|_| Ok(vec![owned_child("legacy", "stale")]));
        mock.expect_delete()
            .once()
            .returning(|_, _| Ok(DeleteOutcome::AlreadyGone));

        let result = reconcile_cron_job_manager(manager(false, vec![]), context(mock)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn one_failing_delete_does_not_block_remaining_orphans() {
        let mut mock = MockChildApi::new();
        mock.expect_list().once().returning(|_| {
            Ok(vec![owned_child("legacy", "a"), owned_child("legacy", "b")])
        });
        mock.expect_delete()
            .withf(|_, name| name == "a")
            .once()
            .returning(|_, _| Err(transient()));
        mock.expect_delete()
            .withf(|_, name| name == "b")
            .once()
            .returning(|_, _| Ok(DeleteOutcome::Deleted));

        let result = reconcile_cron_job_manager(manager(false, vec![]), context(mock)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn list_failure_defers_prune_without_failing_the_reconcile() {
        let mut mock = MockChildApi::new();
        mock.expect_read().once().returning(|_, _| Ok(None));
        mock.expect_create().once().returning(|_, _| Ok(()));
        mock.expect_list().once().returning(|_| Err(transient()));
        mock.expect_delete().never();

        let result =
            reconcile_cron_job_manager(manager(false, vec![job("batch", "cleanup")]), context(mock))
                .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn duplicate_keys_submit_only_the_last_declared_manifest() {
        let mut first = job("batch", "cleanup");
        first.schedule = "0 * * * *".to_string();
        let mut second = job("batch", "cleanup");
        second.schedule = "*/10 * * * *".to_string();

        let mut mock = MockChildApi::new();
        mock.expect_read().once().returning(|_, _| Ok(None));
        mock.expect_create()
            .withf(|_, manifest: &CronJob| {
                manifest.spec.as_ref().unwrap().schedule == "*/10 * * * *"
            })
            .once()
            .returning(|_, _| Ok(()));
        mock.expect_list().once().returning(|_| Ok(vec![]));

        let result =
            reconcile_cron_job_manager(manager(false, vec![first, second]), context(mock)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn manager_without_namespace_is_a_contract_violation() {
        let mut bare = CronJobManager::new(
            "fleet",
            CronJobManagerSpec {
                global_suspend: false,
                jobs: vec![],
            },
        );
        bare.metadata.namespace = None;

        let mock = MockChildApi::new();
        let result = reconcile_cron_job_manager(Arc::new(bare), context(mock)).await;
        assert!(matches!(
            result,
            Err(Error::MissingObjectKey("metadata.namespace"))
        ));
    }
}
