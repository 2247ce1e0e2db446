//! Secret store adapter
//!
//! The security core only needs three primitives from the object store:
//! get, create and delete of a named secret in the deployment's namespace.
//! Create must be atomic and report [`Error::AlreadyExists`] when another
//! writer won; that is the only concurrency guarantee the reconciler relies on.
//!
//! Two implementations are provided:
//!
//! | Store               | Backed by                         | Used by                |
//! |---------------------|-----------------------------------|------------------------|
//! | [`KubeSecretStore`] | Kubernetes `Secret` API (kube-rs)  | the controllers        |
//! | [`MemorySecretStore`] | process memory                  | tests and dry runs     |

mod kubernetes;
mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;

use crate::error::{Error, Result};

pub use self::kubernetes::{KubeSecretStore, DEFAULT_STORE_TIMEOUT};
pub use self::memory::MemorySecretStore;

/// Field holding a hex token or a signed JWT
pub const TOKEN_FIELD: &str = "token";
/// Field holding a PEM encoded CA certificate
pub const CA_CERT_FIELD: &str = "ca.crt";
/// Field holding a PEM encoded CA private key
pub const CA_KEY_FIELD: &str = "ca.key";
/// Field holding raw encryption key bytes in a user supplied keyfile secret
pub const ENCRYPTION_KEY_FIELD: &str = "key";

/// A secret as seen by the security core.
///
/// Only the name, owner and data are relevant; everything else on the
/// Kubernetes object is left to the API server.
#[derive(Clone, PartialEq)]
pub struct CredentialSecret {
    pub name: String,
    pub namespace: Option<String>,
    pub owner: Option<OwnerReference>,
    pub data: BTreeMap<String, Vec<u8>>,
}

// Data is never printed.
impl std::fmt::Debug for CredentialSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSecret")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("owner", &self.owner.as_ref().map(|o| &o.name))
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialSecret {
    pub fn new(name: impl Into<String>, owner: Option<OwnerReference>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            owner,
            data: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    pub fn to_secret(&self, namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(namespace.to_string()),
                owner_references: self.owner.clone().map(|o| vec![o]),
                ..Default::default()
            },
            data: Some(
                self.data
                    .iter()
                    .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn from_secret(secret: Secret) -> Self {
        let owner = secret
            .metadata
            .owner_references
            .and_then(|refs| refs.into_iter().find(|o| o.controller == Some(true)));
        Self {
            name: secret.metadata.name.unwrap_or_default(),
            namespace: secret.metadata.namespace,
            owner,
            data: secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.0))
                .collect(),
        }
    }
}

/// Namespaced secret store with atomic create.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Namespace all operations are scoped to
    fn namespace(&self) -> &str;

    /// Read a secret. `Ok(None)` when it does not exist.
    async fn get(&self, name: &str) -> Result<Option<CredentialSecret>>;

    /// Create a secret. Fails with [`Error::AlreadyExists`] if the name is taken.
    async fn create(&self, secret: &CredentialSecret) -> Result<()>;

    /// Delete a secret. Fails with [`Error::NotFound`] if it does not exist.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Create a secret, treating a concurrent create by someone else as success.
///
/// Returns `true` when this call created the secret.
pub async fn create_if_absent(store: &dyn SecretStore, secret: &CredentialSecret) -> Result<bool> {
    match store.create(secret).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read the `token` field of a secret as a string.
pub async fn get_token_secret(store: &dyn SecretStore, name: &str) -> Result<String> {
    let secret = store.get(name).await?.ok_or_else(|| Error::NotFound {
        name: name.to_string(),
    })?;
    let token = secret.field(TOKEN_FIELD).ok_or_else(|| {
        Error::ValidationError(format!("secret '{name}' has no '{TOKEN_FIELD}' field"))
    })?;
    String::from_utf8(token.to_vec()).map_err(|_| {
        Error::ValidationError(format!("secret '{name}' has a non UTF-8 '{TOKEN_FIELD}' field"))
    })
}
