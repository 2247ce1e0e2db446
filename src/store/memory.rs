//! In-memory secret store
//!
//! Behaves like the Kubernetes store: create is atomic and reports
//! `AlreadyExists`, delete reports `NotFound`. Reads yield to the runtime once
//! so that concurrent reconcile passes interleave the way they do against a
//! real API server.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::error::ErrorResponse;

use super::{CredentialSecret, SecretStore};
use crate::error::{Error, Result, StoreOperation};

#[derive(Default)]
pub struct MemorySecretStore {
    namespace: String,
    secrets: Mutex<BTreeMap<String, CredentialSecret>>,
    failures: Mutex<HashSet<(StoreOperation, String)>>,
    creates: AtomicUsize,
}

impl MemorySecretStore {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    /// Seed a secret without going through `create`
    pub fn insert(&self, mut secret: CredentialSecret) {
        secret.namespace = Some(self.namespace.clone());
        self.lock_secrets().insert(secret.name.clone(), secret);
    }

    /// Make every future `operation` on `name` fail with a store error
    pub fn fail(&self, operation: StoreOperation, name: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((operation, name.to_string()));
    }

    pub fn secret(&self, name: &str) -> Option<CredentialSecret> {
        self.lock_secrets().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock_secrets().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_secrets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful creates since construction
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn lock_secrets(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, CredentialSecret>> {
        self.secrets.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_failure(&self, operation: StoreOperation, name: &str) -> Result<()> {
        let failing = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(operation, name.to_string()));
        if failing {
            return Err(Error::StoreError {
                operation,
                name: name.to_string(),
                source: kube::Error::Api(ErrorResponse {
                    status: "Failure".to_string(),
                    message: "injected store failure".to_string(),
                    reason: "InternalError".to_string(),
                    code: 500,
                }),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, name: &str) -> Result<Option<CredentialSecret>> {
        self.check_failure(StoreOperation::Get, name)?;
        let found = self.secret(name);
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn create(&self, secret: &CredentialSecret) -> Result<()> {
        self.check_failure(StoreOperation::Create, &secret.name)?;
        let mut secrets = self.lock_secrets();
        if secrets.contains_key(&secret.name) {
            return Err(Error::AlreadyExists {
                name: secret.name.clone(),
            });
        }
        let mut stored = secret.clone();
        stored.namespace = Some(self.namespace.clone());
        secrets.insert(secret.name.clone(), stored);
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.check_failure(StoreOperation::Delete, name)?;
        match self.lock_secrets().remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound {
                name: name.to_string(),
            }),
        }
    }
}
