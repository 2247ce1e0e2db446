//! Credential reconciliation for DatabaseCluster deployments
//!
//! Every pass walks the credentials the current spec requires and makes sure
//! each one exists. Nothing is ever rotated: a secret that is present is left
//! alone, with one exception. The exporter token embeds authorization claims
//! and is recreated when those claims drift or its signature no longer
//! verifies against the primary JWT secret.
//!
//! | Credential            | Required when        | Fields                 |
//! |-----------------------|----------------------|------------------------|
//! | primary JWT secret    | authentication       | `token`                |
//! | exporter token        | authentication + metrics | `token` (signed JWT) |
//! | server TLS CA         | TLS                  | `ca.crt`, `ca.key`     |
//! | encryption keyfolder  | encrypted storage    | `<sha256 of key>`      |
//! | sync JWT secret       | sync                 | `token`                |
//! | sync monitoring token | sync                 | `token`                |
//! | sync TLS CA           | sync                 | `ca.crt`, `ca.key`     |
//! | sync client-auth CA   | sync                 | `ca.crt`, `ca.key`     |
//!
//! Concurrent passes are safe because creates go through
//! [`create_if_absent`]: losing a create race counts as success.

use std::time::Instant;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::crd::DatabaseCluster;
use crate::error::{Error, Result};
use crate::store::{
    create_if_absent, get_token_secret, CredentialSecret, SecretStore, ENCRYPTION_KEY_FIELD,
    TOKEN_FIELD,
};

use super::certificates::create_ca_certificate;
use super::claims::{validate_token_secret, ClaimSet};

const TOKEN_LENGTH: usize = 32;

/// One credential a deployment needs, with everything required to create it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSpec {
    /// Random hex token
    Token { secret_name: String },
    /// JWT with the exporter claims, signed with the token in `signing_secret_name`
    ExporterToken {
        secret_name: String,
        signing_secret_name: String,
    },
    /// Self-signed certificate authority
    CaCertificate {
        secret_name: String,
        common_name: String,
        ttl_days: u32,
    },
    /// Keyfolder repackaging the key of a user supplied keyfile secret
    EncryptionKeyfolder {
        keyfile_secret_name: String,
        secret_name: String,
    },
}

impl CredentialSpec {
    pub fn secret_name(&self) -> &str {
        match self {
            CredentialSpec::Token { secret_name }
            | CredentialSpec::ExporterToken { secret_name, .. }
            | CredentialSpec::CaCertificate { secret_name, .. }
            | CredentialSpec::EncryptionKeyfolder { secret_name, .. } => secret_name,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CredentialSpec::Token { .. } => "token",
            CredentialSpec::ExporterToken { .. } => "exporter-token",
            CredentialSpec::CaCertificate { .. } => "ca",
            CredentialSpec::EncryptionKeyfolder { .. } => "keyfolder",
        }
    }
}

/// Credentials required by `cluster`, in the order they must be ensured.
///
/// The exporter token is signed with the primary JWT secret, so it always
/// follows it.
pub fn required_credentials(cluster: &DatabaseCluster) -> Vec<CredentialSpec> {
    let name = cluster.name_any();
    let profile = cluster.security_profile();
    let mut credentials = Vec::new();

    if profile.auth_enabled {
        credentials.push(CredentialSpec::Token {
            secret_name: cluster.jwt_secret_name(),
        });
        if profile.metrics_enabled {
            credentials.push(CredentialSpec::ExporterToken {
                secret_name: cluster.exporter_token_secret_name(),
                signing_secret_name: cluster.jwt_secret_name(),
            });
        }
    }
    if profile.tls_enabled {
        credentials.push(CredentialSpec::CaCertificate {
            secret_name: cluster.tls_ca_secret_name(),
            common_name: format!("{name} Server CA"),
            ttl_days: cluster.spec.tls.effective_ca_ttl_days(),
        });
    }
    if profile.encryption_enabled {
        if let Some(keyfile_secret_name) = cluster.encryption_key_secret_name() {
            credentials.push(CredentialSpec::EncryptionKeyfolder {
                keyfile_secret_name,
                secret_name: cluster.keyfolder_secret_name(),
            });
        }
    }
    if profile.sync_enabled {
        credentials.push(CredentialSpec::Token {
            secret_name: cluster.sync_jwt_secret_name(),
        });
        credentials.push(CredentialSpec::Token {
            secret_name: cluster.sync_monitoring_secret_name(),
        });
        credentials.push(CredentialSpec::CaCertificate {
            secret_name: cluster.sync_tls_ca_secret_name(),
            common_name: format!("{name} Sync CA"),
            ttl_days: cluster.spec.sync.tls.effective_ca_ttl_days(),
        });
        credentials.push(CredentialSpec::CaCertificate {
            secret_name: cluster.sync_client_ca_secret_name(),
            common_name: format!("{name} Sync Client Authentication CA"),
            ttl_days: cluster.spec.sync.tls.effective_ca_ttl_days(),
        });
    }

    credentials
}

/// Outcome of one [`CredentialReconciler::ensure_secrets`] pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnsureSummary {
    pub inspected: usize,
    /// Secrets created by this pass
    pub created: Vec<String>,
}

/// Ensures the credentials of one deployment in its namespace.
pub struct CredentialReconciler<'a> {
    store: &'a dyn SecretStore,
    owner: OwnerReference,
    deployment: String,
}

impl<'a> CredentialReconciler<'a> {
    /// Fails with [`Error::ConfigError`] if the cluster has no uid yet, since
    /// created secrets could not be owned by it.
    pub fn new(store: &'a dyn SecretStore, cluster: &DatabaseCluster) -> Result<Self> {
        let owner = cluster.controller_owner_ref(&()).ok_or_else(|| {
            Error::ConfigError(format!(
                "DatabaseCluster {} has no uid, cannot own secrets",
                cluster.name_any()
            ))
        })?;
        Ok(Self {
            store,
            owner,
            deployment: cluster.name_any(),
        })
    }

    /// Ensure every credential the cluster requires. Stops at the first error.
    #[instrument(skip(self, cluster), fields(deployment = %self.deployment, namespace = %self.store.namespace()))]
    pub async fn ensure_secrets(&self, cluster: &DatabaseCluster) -> Result<EnsureSummary> {
        let start = Instant::now();
        let mut summary = EnsureSummary::default();

        let result = async {
            for credential in required_credentials(cluster) {
                summary.inspected += 1;
                if self.ensure(&credential).await? {
                    summary.created.push(credential.secret_name().to_string());
                }
            }
            Ok::<_, Error>(())
        }
        .await;

        #[cfg(feature = "metrics")]
        super::metrics::observe_inspect_secrets(
            &self.deployment,
            summary.inspected as u64,
            start.elapsed().as_secs_f64(),
        );
        debug!(
            inspected = summary.inspected,
            created = summary.created.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Inspected secrets"
        );

        result.map(|()| summary)
    }

    /// Ensure a single credential. Returns `true` if this call created it.
    pub async fn ensure(&self, credential: &CredentialSpec) -> Result<bool> {
        debug!(
            secret = credential.secret_name(),
            kind = credential.kind(),
            "Ensuring credential"
        );
        match credential {
            CredentialSpec::Token { secret_name } => self.ensure_token_secret(secret_name).await,
            CredentialSpec::ExporterToken {
                secret_name,
                signing_secret_name,
            } => {
                self.ensure_exporter_token_secret(secret_name, signing_secret_name)
                    .await
            }
            CredentialSpec::CaCertificate {
                secret_name,
                common_name,
                ttl_days,
            } => {
                self.ensure_ca_secret(secret_name, common_name, *ttl_days)
                    .await
            }
            CredentialSpec::EncryptionKeyfolder {
                keyfile_secret_name,
                secret_name,
            } => {
                self.ensure_encryption_keyfolder(keyfile_secret_name, secret_name)
                    .await
            }
        }
    }

    /// Create `secret_name` holding a fresh random token unless it exists.
    pub async fn ensure_token_secret(&self, secret_name: &str) -> Result<bool> {
        if self.store.get(secret_name).await?.is_some() {
            return Ok(false);
        }

        let secret = self.owned(secret_name).with_field(TOKEN_FIELD, generate_token());
        self.create(&secret).await
    }

    /// Create or recreate the exporter token so that it carries the exporter
    /// claims and verifies against the token in `signing_secret_name`.
    pub async fn ensure_exporter_token_secret(
        &self,
        secret_name: &str,
        signing_secret_name: &str,
    ) -> Result<bool> {
        let desired = ClaimSet::exporter();
        let validation =
            validate_token_secret(self.store, secret_name, signing_secret_name, &desired).await?;
        if !validation.requires_create() {
            return Ok(false);
        }

        if validation.secret_exists() {
            info!(secret = secret_name, reason = ?validation, "Recreating exporter token secret");
            match self.store.delete(secret_name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let signing_key = get_token_secret(self.store, signing_secret_name).await?;
        let token = desired.sign(&signing_key)?;
        let secret = self.owned(secret_name).with_field(TOKEN_FIELD, token);
        self.create(&secret).await
    }

    /// Create `secret_name` holding a new self-signed CA unless it exists.
    pub async fn ensure_ca_secret(
        &self,
        secret_name: &str,
        common_name: &str,
        ttl_days: u32,
    ) -> Result<bool> {
        if self.store.get(secret_name).await?.is_some() {
            return Ok(false);
        }

        info!(secret = secret_name, common_name, ttl_days, "Creating CA certificate");
        let secret = create_ca_certificate(common_name, ttl_days)?
            .into_secret(secret_name, Some(self.owner.clone()));
        self.create(&secret).await
    }

    /// Package the key of `keyfile_secret_name` into the keyfolder secret.
    ///
    /// The keyfile is validated on every pass, even when the keyfolder
    /// already exists.
    pub async fn ensure_encryption_keyfolder(
        &self,
        keyfile_secret_name: &str,
        secret_name: &str,
    ) -> Result<bool> {
        let keyfile = self.store.get(keyfile_secret_name).await?.ok_or_else(|| {
            Error::ValidationError(format!(
                "encryption keyfile secret '{keyfile_secret_name}' does not exist"
            ))
        })?;
        if keyfile.data.is_empty() {
            return Err(Error::ValidationError(format!(
                "encryption keyfile secret '{keyfile_secret_name}' has no data"
            )));
        }
        let key = keyfile.field(ENCRYPTION_KEY_FIELD).ok_or_else(|| {
            Error::ValidationError(format!(
                "encryption keyfile secret '{keyfile_secret_name}' has no '{ENCRYPTION_KEY_FIELD}' field"
            ))
        })?;

        if self.store.get(secret_name).await?.is_some() {
            return Ok(false);
        }

        let secret = self
            .owned(secret_name)
            .with_field(keyfolder_field_name(key), key.to_vec());
        self.create(&secret).await
    }

    fn owned(&self, secret_name: &str) -> CredentialSecret {
        CredentialSecret::new(secret_name, Some(self.owner.clone()))
    }

    async fn create(&self, secret: &CredentialSecret) -> Result<bool> {
        let created = create_if_absent(self.store, secret).await?;
        if created {
            info!(secret = %secret.name, "Created secret");
        } else {
            debug!(secret = %secret.name, "Secret was created concurrently");
        }
        Ok(created)
    }
}

/// Read the primary JWT secret. `None` when authentication is disabled.
pub async fn get_jwt_secret(
    store: &dyn SecretStore,
    cluster: &DatabaseCluster,
) -> Result<Option<String>> {
    if !cluster.spec.authentication.is_authenticated() {
        return Ok(None);
    }
    read_token(store, &cluster.jwt_secret_name(), "JWT").await.map(Some)
}

/// Read the JWT secret used by the sync masters.
pub async fn get_sync_jwt_secret(store: &dyn SecretStore, cluster: &DatabaseCluster) -> Result<String> {
    read_token(store, &cluster.sync_jwt_secret_name(), "sync JWT").await
}

/// Read the token used to monitor sync masters and workers.
pub async fn get_sync_monitoring_token(
    store: &dyn SecretStore,
    cluster: &DatabaseCluster,
) -> Result<String> {
    read_token(store, &cluster.sync_monitoring_secret_name(), "sync monitoring").await
}

async fn read_token(store: &dyn SecretStore, secret_name: &str, what: &str) -> Result<String> {
    get_token_secret(store, secret_name).await.map_err(|e| {
        debug!(secret = secret_name, error = %e, "Failed to get {} secret", what);
        e
    })
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LENGTH];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn keyfolder_field_name(key: &[u8]) -> String {
    hex::encode(Sha256::digest(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_is_hex_of_32_bytes() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(hex::decode(&token).is_ok());
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_keyfolder_field_is_sha256_hex() {
        assert_eq!(
            keyfolder_field_name(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
