//! Authentication for operator connections to the database

use kube::ResourceExt;
use tracing::debug;

use crate::controller::claims::ClaimSet;
use crate::crd::DatabaseCluster;
use crate::error::{Error, Result};
use crate::store::{get_token_secret, SecretStore};

/// Per-call authentication policy for client construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Authenticate when the deployment has authentication enabled
    #[default]
    Default,
    /// Never attach credentials, e.g. for probes before secrets exist
    Skip,
    /// Fail unless credentials can be attached
    Require,
}

/// Resolve the `Authorization` header value for a connection.
///
/// `cluster` is `None` for bootstrap connections, which have no spec to take
/// an authentication decision from.
pub async fn client_authorization(
    store: &dyn SecretStore,
    cluster: Option<&DatabaseCluster>,
    policy: AuthPolicy,
) -> Result<Option<String>> {
    let cluster = match cluster {
        Some(c) if c.spec.authentication.is_authenticated() => c,
        Some(c) => {
            return match policy {
                AuthPolicy::Require => Err(Error::PolicyError(format!(
                    "authentication is required but disabled for deployment {}",
                    c.name_any()
                ))),
                _ => Ok(None),
            }
        }
        None => {
            return match policy {
                AuthPolicy::Require => Err(Error::PolicyError(
                    "authentication is required but no deployment was given".to_string(),
                )),
                _ => Ok(None),
            }
        }
    };

    if policy == AuthPolicy::Skip {
        debug!(deployment = %cluster.name_any(), "Skipping authentication");
        return Ok(None);
    }

    let secret_name = cluster.jwt_secret_name();
    let signing_key = get_token_secret(store, &secret_name).await?;
    let jwt = ClaimSet::operator().sign(&signing_key)?;
    Ok(Some(format!("bearer {jwt}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AuthenticationSpec, DatabaseClusterSpec, SECRET_NAME_NONE};
    use crate::store::{CredentialSecret, MemorySecretStore, TOKEN_FIELD};

    fn cluster(authenticated: bool) -> DatabaseCluster {
        let spec = DatabaseClusterSpec {
            authentication: AuthenticationSpec {
                jwt_secret_name: (!authenticated).then(|| SECRET_NAME_NONE.to_string()),
            },
            ..Default::default()
        };
        DatabaseCluster::new("example", spec)
    }

    fn store_with_jwt() -> MemorySecretStore {
        let store = MemorySecretStore::new("db");
        store.insert(CredentialSecret::new("example-jwt", None).with_field(TOKEN_FIELD, "key"));
        store
    }

    #[tokio::test]
    async fn test_enabled_auth_mints_operator_bearer() {
        let store = store_with_jwt();
        let header = client_authorization(&store, Some(&cluster(true)), AuthPolicy::Default)
            .await
            .unwrap()
            .unwrap();
        let jwt = header.strip_prefix("bearer ").unwrap();
        assert_eq!(ClaimSet::verify(jwt, "key").unwrap(), ClaimSet::operator());

        let required = client_authorization(&store, Some(&cluster(true)), AuthPolicy::Require)
            .await
            .unwrap();
        assert!(required.is_some());
    }

    #[tokio::test]
    async fn test_skip_attaches_nothing() {
        let store = MemorySecretStore::new("db");
        let header = client_authorization(&store, Some(&cluster(true)), AuthPolicy::Skip)
            .await
            .unwrap();
        assert_eq!(header, None);
    }

    #[tokio::test]
    async fn test_require_with_disabled_auth_is_policy_error() {
        let store = store_with_jwt();
        let err = client_authorization(&store, Some(&cluster(false)), AuthPolicy::Require)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PolicyError(_)));

        let err = client_authorization(&store, None, AuthPolicy::Require)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PolicyError(_)));

        assert_eq!(
            client_authorization(&store, Some(&cluster(false)), AuthPolicy::Default)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_missing_jwt_secret_is_not_found() {
        let store = MemorySecretStore::new("db");
        let err = client_authorization(&store, Some(&cluster(true)), AuthPolicy::Default)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref name } if name == "example-jwt"));
    }
}
