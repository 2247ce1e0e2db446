//! Controller module for DatabaseCluster and DatabaseBackup reconciliation
//!
//! This module contains the controller loops, the credential reconciler and
//! the pieces it is built from.

mod backup;
mod backup_reconciler;
pub mod certificates;
pub mod claims;
pub mod conditions;
#[cfg(feature = "metrics")]
pub mod metrics;
mod reconciler;
pub mod secrets;

pub use backup::{
    download_retry_in, handler_for, next_status, status_changed, StateHandler,
    DOWNLOAD_RETRY_DELAY,
};
pub use backup_reconciler::run_backup_controller;
pub use reconciler::{run_controller, ControllerState};
pub use secrets::{
    get_jwt_secret, get_sync_jwt_secret, get_sync_monitoring_token, required_credentials,
    CredentialReconciler, CredentialSpec, EnsureSummary,
};
