//! Backup state machine
//!
//! Each state has one handler computing the next status from the current
//! one. Handlers are pure: they never touch the API server, and persisting
//! the result is left to the caller, who only writes when the status changed.
//!
//! ```text
//!  (none) ──► Pending ──► InProgress ──► Ready
//!               ▲             │
//!               │             ├──► Failed
//!               │             ▼
//!               └──60s── DownloadError
//! ```
//!
//! Transfers themselves move a backup out of Pending and InProgress; this
//! module only owns initialization and the DownloadError cool-down.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::crd::{BackupState, DatabaseBackup, DatabaseBackupStatus};
use crate::error::{Error, Result};

/// Time a failed download waits before it is retried from Pending
pub const DOWNLOAD_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Computes the next status of a backup at time `now`
pub type StateHandler = fn(&DatabaseBackup, DateTime<Utc>) -> Result<DatabaseBackupStatus>;

/// Handler for a backup in `state`; `None` means no status was recorded yet.
pub fn handler_for(state: Option<BackupState>) -> StateHandler {
    match state {
        None => state_none_handler,
        Some(BackupState::Pending) => state_pending_handler,
        Some(BackupState::InProgress) => state_in_progress_handler,
        Some(BackupState::DownloadError) => state_download_error_handler,
        Some(BackupState::Ready) | Some(BackupState::Failed) => state_terminal_handler,
    }
}

/// Run the handler for the backup's current state.
pub fn next_status(backup: &DatabaseBackup, now: DateTime<Utc>) -> Result<DatabaseBackupStatus> {
    let handler = handler_for(backup.status.as_ref().map(|s| s.state));
    handler(backup, now)
}

/// Whether `next` has to be written back.
pub fn status_changed(current: Option<&DatabaseBackupStatus>, next: &DatabaseBackupStatus) -> bool {
    current != Some(next)
}

/// Time left before a DownloadError backup is retried, if it is in that state.
pub fn download_retry_in(backup: &DatabaseBackup, now: DateTime<Utc>) -> Option<Duration> {
    let status = backup.status.as_ref()?;
    if status.state != BackupState::DownloadError {
        return None;
    }
    let elapsed = status
        .transition_time()
        .map(|t| now.signed_duration_since(t).to_std().unwrap_or_default())
        .unwrap_or(DOWNLOAD_RETRY_DELAY);
    Some(DOWNLOAD_RETRY_DELAY.saturating_sub(elapsed))
}

fn current_status(backup: &DatabaseBackup) -> Result<&DatabaseBackupStatus> {
    backup.status.as_ref().ok_or_else(|| {
        Error::ValidationError(format!(
            "backup {} has no status",
            backup.metadata.name.as_deref().unwrap_or_default()
        ))
    })
}

fn state_none_handler(_backup: &DatabaseBackup, now: DateTime<Utc>) -> Result<DatabaseBackupStatus> {
    Ok(DatabaseBackupStatus::new(BackupState::Pending, now, ""))
}

fn state_pending_handler(backup: &DatabaseBackup, _now: DateTime<Utc>) -> Result<DatabaseBackupStatus> {
    current_status(backup).cloned()
}

fn state_in_progress_handler(
    backup: &DatabaseBackup,
    _now: DateTime<Utc>,
) -> Result<DatabaseBackupStatus> {
    current_status(backup).cloned()
}

fn state_terminal_handler(backup: &DatabaseBackup, _now: DateTime<Utc>) -> Result<DatabaseBackupStatus> {
    current_status(backup).cloned()
}

/// Back to Pending once the cool-down has passed. A transition time that
/// cannot be parsed counts as expired.
fn state_download_error_handler(
    backup: &DatabaseBackup,
    now: DateTime<Utc>,
) -> Result<DatabaseBackupStatus> {
    let status = current_status(backup)?;
    let expired = match status.transition_time() {
        Some(t) => {
            now.signed_duration_since(t).num_milliseconds()
                > DOWNLOAD_RETRY_DELAY.as_millis() as i64
        }
        None => true,
    };
    if expired {
        return Ok(DatabaseBackupStatus::new(BackupState::Pending, now, ""));
    }
    Ok(status.clone())
}
