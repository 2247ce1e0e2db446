//! Kubernetes `Secret` backed store

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, DeleteParams, PostParams},
    Client,
};
use tracing::debug;

use super::{CredentialSecret, SecretStore};
use crate::error::{Error, Result, StoreOperation};

/// Deadline applied to every store call unless overridden
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct KubeSecretStore {
    api: Api<Secret>,
    namespace: String,
    timeout: Duration,
}

impl KubeSecretStore {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a store call under the configured deadline. The inner future is
    /// dropped, and with it the request, when the deadline expires.
    async fn bounded<T, F>(&self, operation: StoreOperation, name: &str, fut: F) -> Result<F::Output>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Timeout {
                operation,
                name: name.to_string(),
            })
    }
}

fn store_error(operation: StoreOperation, name: &str, source: kube::Error) -> Error {
    Error::StoreError {
        operation,
        name: name.to_string(),
        source,
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, name: &str) -> Result<Option<CredentialSecret>> {
        match self
            .bounded(StoreOperation::Get, name, self.api.get_opt(name))
            .await?
        {
            Ok(secret) => Ok(secret.map(CredentialSecret::from_secret)),
            Err(e) => Err(store_error(StoreOperation::Get, name, e)),
        }
    }

    async fn create(&self, secret: &CredentialSecret) -> Result<()> {
        let name = secret.name.as_str();
        let object = secret.to_secret(&self.namespace);
        match self
            .bounded(
                StoreOperation::Create,
                name,
                self.api.create(&PostParams::default(), &object),
            )
            .await?
        {
            Ok(_) => {
                debug!(secret = %name, namespace = %self.namespace, "Created secret");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(Error::AlreadyExists {
                name: name.to_string(),
            }),
            Err(e) => Err(store_error(StoreOperation::Create, name, e)),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match self
            .bounded(
                StoreOperation::Delete,
                name,
                self.api.delete(name, &DeleteParams::default()),
            )
            .await?
        {
            Ok(_) => {
                debug!(secret = %name, namespace = %self.namespace, "Deleted secret");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(Error::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(store_error(StoreOperation::Delete, name, e)),
        }
    }
}
