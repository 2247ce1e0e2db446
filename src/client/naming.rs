//! DNS naming for cluster members and services

use crate::crd::MemberRole;

/// Port every database process listens on
pub const DATABASE_PORT: u16 = 8529;

/// Headless service name backing the member pods
pub fn headless_service_name(deployment: &str) -> String {
    format!("{deployment}-int")
}

/// `<deployment>-<role>-<id>.<deployment>-int.<namespace>.svc`
pub fn pod_dns_name(deployment: &str, namespace: &str, role: &str, id: &str) -> String {
    format!(
        "{deployment}-{role}-{}.{}.{namespace}.svc",
        id.to_lowercase(),
        headless_service_name(deployment)
    )
}

/// `<deployment>.<namespace>.svc`, load balanced over the serving members
pub fn database_service_dns_name(deployment: &str, namespace: &str) -> String {
    format!("{deployment}.{namespace}.svc")
}

/// A member addressed by its DNS name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberEndpoint {
    pub dns_name: String,
    pub role: MemberRole,
    pub id: String,
}

impl MemberEndpoint {
    pub fn new(deployment: &str, namespace: &str, role: MemberRole, id: &str) -> Self {
        Self {
            dns_name: pod_dns_name(deployment, namespace, role.as_role(), id),
            role,
            id: id.to_string(),
        }
    }
}

pub(crate) fn endpoint_url(tls: bool, dns_name: &str) -> String {
    let scheme = if tls { "https" } else { "http" };
    format!("{scheme}://{dns_name}:{DATABASE_PORT}")
}
