//! Connections from the operator to a deployment
//!
//! | Shape      | Addressed by                         | TLS / auth from spec |
//! |------------|--------------------------------------|----------------------|
//! | member     | pod DNS name of one member           | yes                  |
//! | database   | service DNS name, load balanced      | yes                  |
//! | agency     | pod DNS names of all agents          | yes                  |
//! | bootstrap  | pod DNS name, no resource available  | never                |
//!
//! Every connection uses one of the [`shared_transports`] and an explicit
//! [`AuthPolicy`]. Failures are returned as-is; callers own retries.

mod agency;
mod auth;
mod connection;
pub mod naming;
mod transport;

use kube::ResourceExt;
use tracing::debug;

use crate::crd::{DatabaseCluster, MemberRole};
use crate::error::{Error, Result};
use crate::store::SecretStore;

pub use self::agency::{AgencyClient, AgencyConfig, AgentEndpoint};
pub use self::auth::{client_authorization, AuthPolicy};
pub use self::connection::{DatabaseClient, VersionInfo};
pub use self::naming::{MemberEndpoint, DATABASE_PORT};
pub use self::transport::{shared_transports, SharedTransports};

use self::naming::{database_service_dns_name, endpoint_url, pod_dns_name};

fn cluster_namespace(cluster: &DatabaseCluster) -> String {
    cluster.namespace().unwrap_or_else(|| "default".to_string())
}

/// Client for one member of the deployment.
pub async fn create_member_client(
    store: &dyn SecretStore,
    cluster: &DatabaseCluster,
    role: MemberRole,
    id: &str,
    policy: AuthPolicy,
) -> Result<DatabaseClient> {
    let member = MemberEndpoint::new(&cluster.name_any(), &cluster_namespace(cluster), role, id);
    create_client_for_dns_name(store, Some(cluster), &member.dns_name, false, policy).await
}

/// Client for the whole deployment through its database service.
///
/// `short_timeout` selects the pools meant for liveness probing.
pub async fn create_database_client(
    store: &dyn SecretStore,
    cluster: &DatabaseCluster,
    short_timeout: bool,
    policy: AuthPolicy,
) -> Result<DatabaseClient> {
    let dns_name = database_service_dns_name(&cluster.name_any(), &cluster_namespace(cluster));
    create_client_for_dns_name(store, Some(cluster), &dns_name, short_timeout, policy).await
}

/// Client for the agency formed by the agents listed in the cluster status.
pub async fn create_agency_client(
    store: &dyn SecretStore,
    cluster: &DatabaseCluster,
    policy: AuthPolicy,
) -> Result<AgencyClient> {
    let name = cluster.name_any();
    let namespace = cluster_namespace(cluster);
    let tls = cluster.spec.tls.is_secure();
    let agents: Vec<AgentEndpoint> = cluster
        .status
        .as_ref()
        .map(|s| s.members.agents.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|m| {
            let dns_name = pod_dns_name(&name, &namespace, MemberRole::Agent.as_role(), &m.id);
            AgentEndpoint {
                url: endpoint_url(tls, &dns_name),
                dns_name,
            }
        })
        .collect();
    if agents.is_empty() {
        return Err(Error::ConfigError(format!(
            "deployment {name} has no agents in its status"
        )));
    }

    let http = shared_transports()?.select(tls, false);
    let authorization = client_authorization(store, Some(cluster), policy).await?;
    AgencyClient::new(http, agents, authorization)
}

/// Client for a pod that is not yet backed by a deployment resource, such
/// as an image discovery pod. Never uses TLS or authentication.
pub fn create_bootstrap_client(
    deployment: &str,
    namespace: &str,
    role: &str,
    id: &str,
) -> Result<DatabaseClient> {
    let dns_name = pod_dns_name(deployment, namespace, role, id);
    let http = shared_transports()?.select(false, false);
    Ok(DatabaseClient::new(
        http,
        endpoint_url(false, &dns_name),
        dns_name,
        None,
    ))
}

async fn create_client_for_dns_name(
    store: &dyn SecretStore,
    cluster: Option<&DatabaseCluster>,
    dns_name: &str,
    short_timeout: bool,
    policy: AuthPolicy,
) -> Result<DatabaseClient> {
    let tls = cluster.is_some_and(|c| c.spec.tls.is_secure());
    let http = shared_transports()?.select(tls, short_timeout);
    let authorization = client_authorization(store, cluster, policy).await?;
    debug!(
        dns_name,
        tls,
        short_timeout,
        authenticated = authorization.is_some(),
        "Created database client"
    );
    Ok(DatabaseClient::new(
        http,
        endpoint_url(tls, dns_name),
        dns_name,
        authorization,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        AuthenticationSpec, DatabaseClusterSpec, DatabaseClusterStatus, MemberStatus,
        MemberStatusList, TlsSpec, SECRET_NAME_NONE,
    };
    use crate::store::{CredentialSecret, MemorySecretStore, TOKEN_FIELD};
    use kube::api::ObjectMeta;

    fn cluster(spec: DatabaseClusterSpec, agents: &[&str]) -> DatabaseCluster {
        DatabaseCluster {
            metadata: ObjectMeta {
                name: Some("example".to_string()),
                namespace: Some("db".to_string()),
                ..Default::default()
            },
            spec,
            status: Some(DatabaseClusterStatus {
                members: MemberStatusList {
                    agents: agents
                        .iter()
                        .map(|id| MemberStatus { id: id.to_string() })
                        .collect(),
                    ..Default::default()
                },
                ..Default::default()
            }),
        }
    }

    fn insecure_open_spec() -> DatabaseClusterSpec {
        DatabaseClusterSpec {
            authentication: AuthenticationSpec {
                jwt_secret_name: Some(SECRET_NAME_NONE.to_string()),
            },
            tls: TlsSpec {
                ca_secret_name: Some(SECRET_NAME_NONE.to_string()),
                ca_ttl_days: None,
            },
            ..Default::default()
        }
    }

    fn store_with_jwt() -> MemorySecretStore {
        let store = MemorySecretStore::new("db");
        store.insert(CredentialSecret::new("example-jwt", None).with_field(TOKEN_FIELD, "key"));
        store
    }

    #[tokio::test]
    async fn test_member_client_uses_tls_and_auth_from_spec() {
        let store = store_with_jwt();
        let c = cluster(DatabaseClusterSpec::default(), &[]);

        let client = create_member_client(&store, &c, MemberRole::DbServer, "PRMR-1", AuthPolicy::Default)
            .await
            .unwrap();

        assert_eq!(
            client.endpoint(),
            "https://example-prmr-prmr-1.example-int.db.svc:8529"
        );
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_database_client_without_security() {
        let store = MemorySecretStore::new("db");
        let c = cluster(insecure_open_spec(), &[]);

        let client = create_database_client(&store, &c, true, AuthPolicy::Default)
            .await
            .unwrap();

        assert_eq!(client.endpoint(), "http://example.db.svc:8529");
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_database_client_require_without_auth_fails() {
        let store = MemorySecretStore::new("db");
        let c = cluster(insecure_open_spec(), &[]);
        let err = create_database_client(&store, &c, false, AuthPolicy::Require)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PolicyError(_)));
    }

    #[tokio::test]
    async fn test_agency_client_lists_every_agent() {
        let store = store_with_jwt();
        let c = cluster(DatabaseClusterSpec::default(), &["a1", "a2", "a3"]);

        let agency = create_agency_client(&store, &c, AuthPolicy::Skip)
            .await
            .unwrap();

        let urls: Vec<&str> = agency.agents().iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example-agnt-a1.example-int.db.svc:8529",
                "https://example-agnt-a2.example-int.db.svc:8529",
                "https://example-agnt-a3.example-int.db.svc:8529",
            ]
        );
        assert!(!agency.is_authenticated());
    }

    #[tokio::test]
    async fn test_agency_client_without_agents_fails() {
        let store = store_with_jwt();
        let c = cluster(DatabaseClusterSpec::default(), &[]);
        let err = create_agency_client(&store, &c, AuthPolicy::Default)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_bootstrap_client_is_plain_and_anonymous() {
        let client = create_bootstrap_client("example", "db", "id", "abc").unwrap();
        assert_eq!(
            client.endpoint(),
            "http://example-id-abc.example-int.db.svc:8529"
        );
        assert!(!client.is_authenticated());
    }
}
