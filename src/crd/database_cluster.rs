//! DatabaseCluster Custom Resource Definition
//!
//! The DatabaseCluster CRD represents a managed multi-node database
//! deployment. Only the parts the security core reads are modelled here.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    AuthenticationSpec, Condition, MemberStatusList, MetricsSpec, RocksDbSpec, SyncSpec, TlsSpec,
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "dbcluster.io",
    version = "v1",
    kind = "DatabaseCluster",
    namespaced,
    status = "DatabaseClusterStatus",
    shortname = "dbc",
    printcolumn = r#"{"name":"SecretsReady","type":"string","jsonPath":".status.conditions[?(@.type=='SecretsReady')].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseClusterSpec {
    #[serde(default)]
    pub authentication: AuthenticationSpec,

    #[serde(default)]
    pub tls: TlsSpec,

    #[serde(default)]
    pub rocksdb: RocksDbSpec,

    #[serde(default)]
    pub sync: SyncSpec,

    #[serde(default)]
    pub metrics: MetricsSpec,
}

impl DatabaseClusterSpec {
    /// Validate combinations the operator cannot secure
    pub fn validate(&self) -> Result<(), String> {
        if self.sync.enabled && !self.authentication.is_authenticated() {
            return Err("spec.sync.enabled requires authentication to be enabled".to_string());
        }
        if self.sync.enabled && !self.tls.is_secure() {
            return Err("spec.sync.enabled requires TLS to be enabled".to_string());
        }
        if self.sync.enabled && !self.sync.tls.is_secure() {
            return Err("spec.sync.tls.caSecretName cannot be None".to_string());
        }
        self.tls.validate_ca_ttl("spec.tls")?;
        if self.sync.enabled {
            self.sync.tls.validate_ca_ttl("spec.sync.tls")?;
        }
        Ok(())
    }
}

/// Status subresource of a DatabaseCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseClusterStatus {
    #[serde(default)]
    pub members: MemberStatusList,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Which security features apply to a deployment.
///
/// Derived from the spec on every pass, never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeploymentSecurityProfile {
    pub auth_enabled: bool,
    pub tls_enabled: bool,
    pub encryption_enabled: bool,
    pub metrics_enabled: bool,
    pub sync_enabled: bool,
}

impl DeploymentSecurityProfile {
    pub fn from_spec(spec: &DatabaseClusterSpec) -> Self {
        Self {
            auth_enabled: spec.authentication.is_authenticated(),
            tls_enabled: spec.tls.is_secure(),
            encryption_enabled: spec.rocksdb.is_encrypted(),
            metrics_enabled: spec.metrics.enabled,
            sync_enabled: spec.sync.enabled,
        }
    }
}

// Secret names. Unset names default to `<deployment>-<suffix>`.
impl DatabaseCluster {
    pub fn security_profile(&self) -> DeploymentSecurityProfile {
        DeploymentSecurityProfile::from_spec(&self.spec)
    }

    fn secret_name_or_default(&self, name: &Option<String>, suffix: &str) -> String {
        match name.as_deref() {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("{}-{}", self.name_any(), suffix),
        }
    }

    pub fn jwt_secret_name(&self) -> String {
        self.secret_name_or_default(&self.spec.authentication.jwt_secret_name, "jwt")
    }

    pub fn tls_ca_secret_name(&self) -> String {
        self.secret_name_or_default(&self.spec.tls.ca_secret_name, "ca")
    }

    pub fn sync_jwt_secret_name(&self) -> String {
        self.secret_name_or_default(&self.spec.sync.authentication.jwt_secret_name, "sync-jwt")
    }

    pub fn sync_monitoring_secret_name(&self) -> String {
        self.secret_name_or_default(&self.spec.sync.monitoring.token_secret_name, "sync-mt")
    }

    pub fn sync_tls_ca_secret_name(&self) -> String {
        self.secret_name_or_default(&self.spec.sync.tls.ca_secret_name, "sync-ca")
    }

    pub fn sync_client_ca_secret_name(&self) -> String {
        self.secret_name_or_default(
            &self.spec.sync.authentication.client_ca_secret_name,
            "sync-client-auth-ca",
        )
    }

    pub fn exporter_token_secret_name(&self) -> String {
        self.secret_name_or_default(&self.spec.metrics.jwt_token_secret_name, "exporter-jwt-token")
    }

    /// Name of the user supplied keyfile secret, if encryption is configured
    pub fn encryption_key_secret_name(&self) -> Option<String> {
        self.spec
            .rocksdb
            .encryption
            .key_secret_name
            .clone()
            .filter(|n| !n.is_empty())
    }

    /// Name of the keyfolder secret derived from the encryption keyfile
    pub fn keyfolder_secret_name(&self) -> String {
        format!("{}-encryption-folder", self.name_any())
    }
}
