//! Client for the agency, the agents' consensus store
//!
//! Every agent endpoint is handed to the client. Followers answer with a
//! temporary redirect to the current leader; the client follows it itself
//! because the shared transports never follow redirects, and only when the
//! redirect points at one of the known agents. A request is tried against
//! each agent in turn until one answers without a server error.

use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::connection::response_error;
use crate::error::{Error, Result};

const READ_PATH: &str = "/_api/agency/read";
const CONFIG_PATH: &str = "/_api/agency/config";

/// Subset of `GET /_api/agency/config`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AgencyConfig {
    #[serde(rename = "leaderId", default)]
    pub leader_id: String,
    #[serde(default)]
    pub term: u64,
}

/// One agent, addressed by its endpoint URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentEndpoint {
    pub url: String,
    pub dns_name: String,
}

#[derive(Clone)]
pub struct AgencyClient {
    http: &'static Client,
    agents: Vec<AgentEndpoint>,
    authorization: Option<String>,
}

impl std::fmt::Debug for AgencyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgencyClient")
            .field("agents", &self.agents)
            .field("authenticated", &self.authorization.is_some())
            .finish()
    }
}

impl AgencyClient {
    /// Fails with [`Error::ConfigError`] when no agents are given.
    pub fn new(
        http: &'static Client,
        agents: Vec<AgentEndpoint>,
        authorization: Option<String>,
    ) -> Result<Self> {
        if agents.is_empty() {
            return Err(Error::ConfigError(
                "agency client needs at least one agent endpoint".to_string(),
            ));
        }
        Ok(Self {
            http,
            agents,
            authorization,
        })
    }

    pub fn agents(&self) -> &[AgentEndpoint] {
        &self.agents
    }

    pub fn is_authenticated(&self) -> bool {
        self.authorization.is_some()
    }

    /// Read the given key paths, e.g. `[["/arango/Plan"]]`.
    pub async fn read(&self, keys: &[Vec<String>]) -> Result<Value> {
        let body = json!(keys);
        let response = self.call(Method::POST, READ_PATH, Some(&body)).await?;
        Ok(response.json().await?)
    }

    /// Current leader and term as seen by the answering agent.
    pub async fn config(&self) -> Result<AgencyConfig> {
        let response = self.call(Method::GET, CONFIG_PATH, None).await?;
        Ok(response.json().await?)
    }

    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let mut last_error = None;
        for agent in &self.agents {
            let url = format!("{}{}", agent.url, path);
            let result = self
                .send_to_leader(&method, &url, agent, body)
                .await
                .and_then(|(response, dns_name)| {
                    response
                        .error_for_status()
                        .map_err(|source| response_error(&dns_name, source))
                });
            match result {
                Ok(response) => return Ok(response),
                Err(e @ Error::ConnectionError { .. }) => {
                    warn!(agent = %agent.dns_name, error = %e, "Agent unreachable, trying next");
                    last_error = Some(e);
                }
                Err(e @ Error::ResponseError { status: 500.., .. }) => {
                    warn!(agent = %agent.dns_name, error = %e, "Agent unavailable, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            Error::ConfigError("agency client has no agent endpoints".to_string())
        }))
    }

    /// Send to `url`, following at most one redirect from a follower.
    ///
    /// Returns the response with the DNS name of the agent that produced it.
    async fn send_to_leader(
        &self,
        method: &Method,
        url: &str,
        agent: &AgentEndpoint,
        body: Option<&Value>,
    ) -> Result<(Response, String)> {
        let response = self.send(method, url, &agent.dns_name, body).await?;
        if !matches!(
            response.status(),
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
        ) {
            return Ok((response, agent.dns_name.clone()));
        }

        let leader = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::ValidationError(format!(
                    "agent {} redirected without a Location header",
                    agent.dns_name
                ))
            })?;
        let target = self.known_agent(&leader).ok_or_else(|| {
            Error::ValidationError(format!(
                "agent {} redirected to {} which is not an agent of this deployment",
                agent.dns_name, leader
            ))
        })?;
        debug!(agent = %agent.dns_name, leader = %target.dns_name, "Following redirect to agency leader");
        let response = self.send(method, &leader, &target.dns_name, body).await?;
        Ok((response, target.dns_name.clone()))
    }

    /// The agent whose scheme, host and port match `url`.
    fn known_agent(&self, url: &str) -> Option<&AgentEndpoint> {
        let target = Url::parse(url).ok()?;
        self.agents.iter().find(|agent| {
            Url::parse(&agent.url).is_ok_and(|known| same_origin(&known, &target))
        })
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        dns_name: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(value) = &self.authorization {
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|source| Error::ConnectionError {
            dns_name: dns_name.to_string(),
            source,
        })
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}
