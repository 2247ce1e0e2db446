//! Connection to a single database endpoint

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Response of `GET /_api/version`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    pub server: String,
    pub version: String,
    #[serde(default)]
    pub license: Option<String>,
}

/// Authenticated handle to one member, the database service or a bootstrap pod.
#[derive(Clone)]
pub struct DatabaseClient {
    http: &'static Client,
    endpoint: String,
    dns_name: String,
    authorization: Option<String>,
}

impl std::fmt::Debug for DatabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseClient")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.authorization.is_some())
            .finish()
    }
}

impl DatabaseClient {
    /// `dns_name` is only used to give errors context.
    pub fn new(
        http: &'static Client,
        endpoint: impl Into<String>,
        dns_name: impl Into<String>,
        authorization: Option<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            dns_name: dns_name.into(),
            authorization,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn dns_name(&self) -> &str {
        &self.dns_name
    }

    pub fn is_authenticated(&self) -> bool {
        self.authorization.is_some()
    }

    /// Build a request against `path` with credentials attached.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        let builder = self.http.request(method, url);
        match &self.authorization {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        }
    }

    /// Send a request, failing on transport errors and non-success statuses.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|source| Error::ConnectionError {
            dns_name: self.dns_name.clone(),
            source,
        })?;
        debug!(endpoint = %self.endpoint, status = %response.status(), "Database response");
        response
            .error_for_status()
            .map_err(|source| response_error(&self.dns_name, source))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        Ok(response.json().await?)
    }

    /// Server name and version, also used as a liveness probe.
    pub async fn version(&self) -> Result<VersionInfo> {
        self.get_json("/_api/version").await
    }
}

/// Attach the endpoint's DNS name to an error status.
pub(crate) fn response_error(dns_name: &str, source: reqwest::Error) -> Error {
    Error::ResponseError {
        dns_name: dns_name.to_string(),
        status: source.status().map(|s| s.as_u16()).unwrap_or_default(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::test_transport;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, authorization: Option<&str>) -> DatabaseClient {
        DatabaseClient::new(
            test_transport(),
            server.uri(),
            "example.db.svc",
            authorization.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_version_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_api/version"))
            .and(header("authorization", "bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"server": "dbserver", "version": "3.12.0", "license": "community"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let info = client(&server, Some("bearer abc")).version().await.unwrap();
        assert_eq!(info.version, "3.12.0");
        assert_eq!(info.license.as_deref(), Some("community"));
    }

    #[tokio::test]
    async fn test_unauthenticated_client_sends_no_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_api/version"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_api/version"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"server": "dbserver", "version": "3.12.0"}"#),
            )
            .mount(&server)
            .await;

        let c = client(&server, None);
        assert!(!c.is_authenticated());
        assert_eq!(c.version().await.unwrap().license, None);
    }

    #[tokio::test]
    async fn test_error_status_carries_dns_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_api/version"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let c = client(&server, None);
        let err = c.version().await.unwrap_err();
        match &err {
            Error::ResponseError {
                dns_name, status, ..
            } => {
                assert_eq!(dns_name, c.dns_name());
                assert_eq!(*status, 503);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains(c.dns_name()));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn test_refused_connection_names_the_dns_name() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let uri = format!("http://127.0.0.1:{port}");

        let c = DatabaseClient::new(test_transport(), uri, "example-agnt-a1.example-int.db.svc", None);
        let err = c.version().await.unwrap_err();
        assert!(matches!(
            err,
            Error::ConnectionError { ref dns_name, .. } if dns_name == "example-agnt-a1.example-int.db.svc"
        ));
    }
}
