use crate::crds::CronJobManager;
use futures::StreamExt;
use kube::api::ListParams;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, Instrument};

pub mod children;
pub mod config;
pub mod controller;
pub mod desired;
pub mod manifest;
pub mod types;

// Re-export commonly used items
pub use config::ControllerConfig;
pub use controller::reconcile_cron_job_manager;
pub use types::{Error, Result};

use children::KubeChildren;
use types::Context;

/// Main entry point for the CronJobManager controller
#[instrument(skip(client, config))]
pub async fn run_manager_controller(client: Client, config: Arc<ControllerConfig>) -> Result<()> {
    let managers: Api<CronJobManager> = match &config.watch_namespace {
        Some(namespace) => {
            info!("Watching CronJobManagers in namespace: {}", namespace);
            Api::namespaced(client.clone(), namespace)
        }
        None => {
            info!("Watching CronJobManagers in all namespaces");
            Api::all(client.clone())
        }
    };

    debug!("Creating controller context...");

    // Create shared context
    let context = Arc::new(Context {
        children: Arc::new(KubeChildren::new(client.clone())),
        config,
    });

    // Startup visibility: list existing managers so we can see what the
    // controller should observe
    match managers.list(&ListParams::default()).await {
        Ok(list) => {
            info!(
                "Controller startup: found {} CronJobManager(s)",
                list.items.len()
            );
            for manager in list.items {
                info!(
                    "Existing CronJobManager: namespace={}, name={}, jobs={}, globalSuspend={}",
                    manager.namespace().unwrap_or_default(),
                    manager.name_any(),
                    manager.spec.jobs.len(),
                    manager.spec.global_suspend
                );
            }
        }
        Err(e) => {
            error!("Failed to list CronJobManagers at startup: {}", e);
        }
    }

    info!("Starting CronJobManager controller");

    let watcher_config = Config::default().any_semantic();

    Controller::new(managers, watcher_config)
        .run(reconcile_cron_job_manager, error_policy, context)
        .for_each(|reconciliation_result| {
            let span = tracing::info_span!("manager_reconciliation_result");
            async move {
                match reconciliation_result {
                    Ok(manager_resource) => {
                        info!(
                            resource = ?manager_resource,
                            "CronJobManager reconciliation successful"
                        );
                    }
                    Err(reconciliation_err) => {
                        error!(
                            error = ?reconciliation_err,
                            "CronJobManager reconciliation error"
                        );
                    }
                }
            }
            .instrument(span)
        })
        .await;

    info!("CronJobManager controller shutting down");
    Ok(())
}

/// Error policy for the CronJobManager controller.
///
/// Only contract violations (malformed parent declarations) reach this point;
/// cluster transients are contained inside the reconcile pass. Re-declaring
/// the parent triggers the next attempt, so no timed requeue is scheduled.
#[instrument(skip(_ctx), fields(manager_name = %manager.name_any()))]
fn error_policy(manager: Arc<CronJobManager>, err: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        error = ?err,
        manager_name = %manager.name_any(),
        "CronJobManager reconciliation failed"
    );
    Action::await_change()
}
