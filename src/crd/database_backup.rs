//! DatabaseBackup Custom Resource Definition
//!
//! A DatabaseBackup tracks one long-running backup operation of a
//! [`DatabaseCluster`](super::DatabaseCluster). The status record is the
//! persisted state of the backup state machine.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "backup.dbcluster.io",
    version = "v1",
    kind = "DatabaseBackup",
    namespaced,
    status = "DatabaseBackupStatus",
    shortname = "dbb",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseBackupSpec {
    /// Name of the DatabaseCluster in the same namespace
    pub deployment: String,

    /// Download an existing backup from a remote repository instead of creating one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<BackupTransferSpec>,

    /// Upload the backup to a remote repository once created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<BackupTransferSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupTransferSpec {
    pub repository_url: String,

    /// Backup id in the remote repository (downloads only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Closed set of backup states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum BackupState {
    #[default]
    Pending,
    InProgress,
    Ready,
    DownloadError,
    Failed,
}

impl std::fmt::Display for BackupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupState::Pending => write!(f, "Pending"),
            BackupState::InProgress => write!(f, "InProgress"),
            BackupState::Ready => write!(f, "Ready"),
            BackupState::DownloadError => write!(f, "DownloadError"),
            BackupState::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseBackupStatus {
    pub state: BackupState,

    /// Time of the last state transition (RFC 3339)
    pub time: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl DatabaseBackupStatus {
    pub fn new(state: BackupState, time: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            state,
            time: time.to_rfc3339(),
            message: message.into(),
        }
    }

    /// Parsed transition time; `None` when the stored value is not RFC 3339
    pub fn transition_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}
