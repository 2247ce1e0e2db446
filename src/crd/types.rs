//! Shared types for database cluster specifications
//!
//! These types describe the security-relevant parts of a [`DatabaseCluster`]:
//! which credentials must exist and under which secret names.
//!
//! # Type Hierarchy
//!
//! - [`AuthenticationSpec`] - JWT secret used by all cluster members
//! - [`TlsSpec`] - CA secret used to issue server certificates
//! - [`RocksDbSpec`] / [`EncryptionSpec`] - user supplied encryption keyfile
//! - [`SyncSpec`] - credentials for the datacenter-to-datacenter sync processes
//! - [`MetricsSpec`] - exporter sidecar and its claims-bound token
//! - [`MemberStatusList`] - members known to the operator, used for agency endpoints
//!
//! A secret name of `"None"` disables the feature it belongs to, which is how
//! authentication and TLS are switched off.
//!
//! [`DatabaseCluster`]: super::DatabaseCluster

use chrono::{DateTime, Datelike, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Secret name that disables authentication or TLS when used as the secret name
pub const SECRET_NAME_NONE: &str = "None";

/// Last year a certificate validity date can be encoded in
pub const MAX_CERTIFICATE_YEAR: i32 = 9999;

/// Expiry of a CA issued at `issued` for `ttl_days`.
///
/// `None` when the expiry falls after the last encodable year.
pub fn ca_expiry(issued: DateTime<Utc>, ttl_days: u32) -> Option<DateTime<Utc>> {
    issued
        .checked_add_signed(Duration::days(i64::from(ttl_days)))
        .filter(|until| until.year() <= MAX_CERTIFICATE_YEAR)
}

/// Role of a cluster member, used for naming pods and DNS entries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum MemberRole {
    Single,
    Agent,
    DbServer,
    Coordinator,
    SyncMaster,
    SyncWorker,
}

impl MemberRole {
    /// Short role name used in pod and DNS names
    pub fn as_role(&self) -> &'static str {
        match self {
            MemberRole::Single => "single",
            MemberRole::Agent => "agnt",
            MemberRole::DbServer => "prmr",
            MemberRole::Coordinator => "crdn",
            MemberRole::SyncMaster => "syma",
            MemberRole::SyncWorker => "sywo",
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_role())
    }
}

/// Authentication configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    /// Name of the secret holding the JWT signing token.
    /// Defaults to `<deployment>-jwt`; `None` disables authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret_name: Option<String>,
}

impl AuthenticationSpec {
    pub fn is_authenticated(&self) -> bool {
        self.jwt_secret_name.as_deref() != Some(SECRET_NAME_NONE)
    }
}

/// TLS configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Name of the secret holding the CA certificate and key.
    /// `None` disables TLS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_secret_name: Option<String>,

    /// Validity of a generated CA in days (default 10 years)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_ttl_days: Option<u32>,
}

impl TlsSpec {
    pub fn is_secure(&self) -> bool {
        self.ca_secret_name.as_deref() != Some(SECRET_NAME_NONE)
    }

    pub fn effective_ca_ttl_days(&self) -> u32 {
        self.ca_ttl_days.unwrap_or(3650)
    }

    /// Reject a TTL whose CA would expire after 9999-12-31. `field` names
    /// the spec path in the error.
    pub fn validate_ca_ttl(&self, field: &str) -> Result<(), String> {
        if !self.is_secure() {
            return Ok(());
        }
        let ttl = self.effective_ca_ttl_days();
        match ca_expiry(Utc::now(), ttl) {
            Some(_) => Ok(()),
            None => Err(format!(
                "{field}.caTtlDays {ttl} puts the CA expiry past {MAX_CERTIFICATE_YEAR}-12-31"
            )),
        }
    }
}

/// RocksDB storage engine configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RocksDbSpec {
    #[serde(default)]
    pub encryption: EncryptionSpec,
}

impl RocksDbSpec {
    pub fn is_encrypted(&self) -> bool {
        self.encryption
            .key_secret_name
            .as_deref()
            .is_some_and(|n| !n.is_empty())
    }
}

/// Encryption at rest configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionSpec {
    /// Name of a pre-existing secret holding the encryption key under `key`.
    /// The operator never generates encryption keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_secret_name: Option<String>,
}

/// Datacenter-to-datacenter synchronization configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub authentication: SyncAuthenticationSpec,

    #[serde(default)]
    pub monitoring: MonitoringSpec,

    #[serde(default)]
    pub tls: TlsSpec,
}

/// Authentication configuration of the sync processes
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncAuthenticationSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret_name: Option<String>,

    /// CA used to verify client certificates presented to the sync masters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ca_secret_name: Option<String>,
}

/// Monitoring configuration of the sync processes
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_secret_name: Option<String>,
}

/// Metrics exporter configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Secret receiving the exporter's claims-bound JWT
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_token_secret_name: Option<String>,
}

/// Status of a single member
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberStatus {
    pub id: String,
}

/// Members per role, as recorded by the operator
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberStatusList {
    #[serde(default)]
    pub single: Vec<MemberStatus>,
    #[serde(default)]
    pub agents: Vec<MemberStatus>,
    #[serde(default)]
    pub dbservers: Vec<MemberStatus>,
    #[serde(default)]
    pub coordinators: Vec<MemberStatus>,
}

/// Kubernetes-style condition
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., "SecretsReady")
    #[serde(rename = "type")]
    pub type_: String,
    /// Status of the condition: "True", "False", or "Unknown"
    pub status: String,
    /// Last time the condition transitioned
    pub last_transition_time: String,
    /// Machine-readable reason for the condition
    pub reason: String,
    /// Human-readable message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
