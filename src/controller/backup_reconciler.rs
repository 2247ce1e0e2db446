//! Controller applying the backup state machine to DatabaseBackup resources

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use kube::{
    api::{Api, Patch, PatchParams},
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::crd::{BackupState, DatabaseBackup, DatabaseBackupStatus};
use crate::error::{Error, Result};

use super::backup::{download_retry_in, next_status, status_changed};
use super::reconciler::{requeue_after, ControllerState, FIELD_MANAGER};

const CONTROLLER_NAME: &str = "databasebackup";

/// How often backups waiting on a transfer are revisited
const ACTIVE_REQUEUE: Duration = Duration::from_secs(30);

pub async fn run_backup_controller(state: Arc<ControllerState>) -> Result<()> {
    let backups: Api<DatabaseBackup> = Api::all(state.client.clone());

    info!("Starting DatabaseBackup controller");

    Controller::new(backups, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled: {:?}", obj),
                Err(e) => warn!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

#[instrument(skip(ctx), fields(name = %backup.name_any(), namespace = backup.namespace()))]
async fn reconcile(backup: Arc<DatabaseBackup>, ctx: Arc<ControllerState>) -> Result<Action> {
    let now = Utc::now();
    let next = next_status(&backup, now)?;

    if status_changed(backup.status.as_ref(), &next) {
        info!(
            from = %backup.status.as_ref().map(|s| s.state.to_string()).unwrap_or_default(),
            to = %next.state,
            "Backup state transition"
        );
        update_status(&ctx, &backup, &next).await?;
    }

    Ok(match next.state {
        BackupState::Ready | BackupState::Failed => Action::await_change(),
        BackupState::DownloadError => {
            let wait = download_retry_in(&backup, now).unwrap_or(ACTIVE_REQUEUE);
            Action::requeue(wait + Duration::from_secs(1))
        }
        BackupState::Pending | BackupState::InProgress => Action::requeue(ACTIVE_REQUEUE),
    })
}

async fn update_status(
    ctx: &ControllerState,
    backup: &DatabaseBackup,
    status: &DatabaseBackupStatus,
) -> Result<()> {
    let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<DatabaseBackup> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({ "status": status });
    api.patch_status(
        &backup.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await
    .map_err(Error::KubeError)?;
    Ok(())
}

fn error_policy(backup: Arc<DatabaseBackup>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!("Backup reconciliation error for {}: {}", backup.name_any(), error);

    #[cfg(feature = "metrics")]
    super::metrics::inc_reconcile_error(CONTROLLER_NAME, error.kind());

    Action::requeue(requeue_after(error))
}
