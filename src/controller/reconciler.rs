//! Reconciler for DatabaseCluster resources
//!
//! Runs the credential pass for every deployment and reports the outcome in
//! the `SecretsReady` condition. Secrets are owned by the cluster, so they
//! are garbage collected with it and no finalizer is needed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::crd::{Condition, DatabaseCluster};
use crate::error::{Error, Result};
use crate::store::KubeSecretStore;

use super::conditions::{
    set_condition, set_secrets_ready, CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE,
    CONDITION_TYPE_SPEC_VALID,
};
use super::secrets::CredentialReconciler;

pub(crate) const CONTROLLER_NAME: &str = "databasecluster";
pub(crate) const FIELD_MANAGER: &str = "dbcluster-operator";

/// Interval between passes when nothing changes
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Shared state for the controllers
pub struct ControllerState {
    pub client: Client,
    /// Deadline for every secret store call
    pub store_timeout: Duration,
}

/// Main entry point to start the DatabaseCluster controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let clusters: Api<DatabaseCluster> = Api::all(client.clone());

    info!("Starting DatabaseCluster controller");

    if let Err(e) = clusters.list(&ListParams::default().limit(1)).await {
        error!(
            "DatabaseCluster CRD not found. Please install the CRD first: {:?}",
            e
        );
        return Err(Error::ConfigError(
            "DatabaseCluster CRD not installed".to_string(),
        ));
    }

    Controller::new(clusters, Config::default())
        .owns::<Secret>(Api::all(client.clone()), Config::default())
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

#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<DatabaseCluster>, ctx: Arc<ControllerState>) -> Result<Action> {
    let start = Instant::now();
    let result = apply_cluster(&ctx, &obj).await;

    #[cfg(feature = "metrics")]
    super::metrics::observe_reconcile_duration_seconds(
        CONTROLLER_NAME,
        start.elapsed().as_secs_f64(),
    );
    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Reconcile finished");

    result
}

async fn apply_cluster(ctx: &ControllerState, cluster: &DatabaseCluster) -> Result<Action> {
    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
    let name = cluster.name_any();
    let generation = cluster.metadata.generation;
    let current = cluster
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    let mut conditions = current.clone();

    if let Err(e) = check_spec(cluster, &mut conditions) {
        warn!("Validation failed for {}/{}: {}", namespace, name, e);
        update_conditions(ctx, cluster, &current, &conditions).await?;
        return Err(e);
    }

    let store =
        KubeSecretStore::new(ctx.client.clone(), &namespace).with_timeout(ctx.store_timeout);
    let reconciler = CredentialReconciler::new(&store, cluster)?;
    let outcome = reconciler.ensure_secrets(cluster).await;

    set_secrets_ready(
        &mut conditions,
        outcome.as_ref().map(|s| s.inspected),
        generation,
    );
    update_conditions(ctx, cluster, &current, &conditions).await?;

    let summary = outcome?;
    if !summary.created.is_empty() {
        info!(
            "Created {} secret(s) for {}/{}: {:?}",
            summary.created.len(),
            namespace,
            name,
            summary.created
        );
    }

    Ok(Action::requeue(RESYNC_INTERVAL))
}

/// Validate the spec and record the result as the SpecValid condition.
pub(crate) fn check_spec(cluster: &DatabaseCluster, conditions: &mut Vec<Condition>) -> Result<()> {
    let generation = cluster.metadata.generation;
    match cluster.spec.validate() {
        Ok(()) => {
            set_condition(
                conditions,
                CONDITION_TYPE_SPEC_VALID,
                CONDITION_STATUS_TRUE,
                "Valid",
                "",
                generation,
            );
            Ok(())
        }
        Err(e) => {
            set_condition(
                conditions,
                CONDITION_TYPE_SPEC_VALID,
                CONDITION_STATUS_FALSE,
                "InvalidSpec",
                &e,
                generation,
            );
            Err(Error::ValidationError(e))
        }
    }
}

/// Patch the status conditions when they differ from what is stored.
async fn update_conditions(
    ctx: &ControllerState,
    cluster: &DatabaseCluster,
    current: &[Condition],
    conditions: &[Condition],
) -> Result<()> {
    if current == conditions {
        return Ok(());
    }

    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<DatabaseCluster> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = serde_json::json!({
        "status": {
            "conditions": conditions,
            "observedGeneration": cluster.metadata.generation,
        }
    });
    api.patch_status(
        &cluster.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await
    .map_err(Error::KubeError)?;

    Ok(())
}

fn error_policy(cluster: Arc<DatabaseCluster>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!("Reconciliation error for {}: {}", cluster.name_any(), error);

    #[cfg(feature = "metrics")]
    super::metrics::inc_reconcile_error(CONTROLLER_NAME, error.kind());

    Action::requeue(requeue_after(error))
}

/// Shorter retry for transient failures
pub(crate) fn requeue_after(error: &Error) -> Duration {
    if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    }
}
