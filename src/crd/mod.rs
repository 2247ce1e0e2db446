//! Custom Resource Definitions for the DBCluster operator
//!
//! This module defines the Kubernetes CRDs the security core reads and writes.

mod database_backup;
mod database_cluster;
pub mod types;

#[cfg(test)]
mod tests;

pub use database_backup::{
    BackupState, BackupTransferSpec, DatabaseBackup, DatabaseBackupSpec, DatabaseBackupStatus,
};
pub use database_cluster::{
    DatabaseCluster, DatabaseClusterSpec, DatabaseClusterStatus, DeploymentSecurityProfile,
};
pub use types::*;
