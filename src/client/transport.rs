//! Process-wide pooled HTTP transports
//!
//! Four clients cover every connection the operator makes: plaintext or TLS,
//! each with a normal and a short idle timeout. Short pools are used for
//! liveness probes where failing fast matters more than connection reuse.
//! They are built once and shared by reference so frequent reconciles do not
//! grow the number of idle connections.

use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::{redirect, Client};
use tracing::debug;

use crate::error::Result;

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(30);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(90);
pub const SHORT_IDLE_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_IDLE_PER_HOST: usize = 100;

static TRANSPORTS: OnceCell<SharedTransports> = OnceCell::new();

pub struct SharedTransports {
    plain: Client,
    tls: Client,
    plain_short: Client,
    tls_short: Client,
}

impl SharedTransports {
    fn build() -> Result<Self> {
        debug!("Building shared HTTP transports");
        Ok(Self {
            plain: build_transport(false, false)?,
            tls: build_transport(true, false)?,
            plain_short: build_transport(false, true)?,
            tls_short: build_transport(true, true)?,
        })
    }

    /// Pick the pool for a connection
    pub fn select(&self, tls: bool, short_timeout: bool) -> &Client {
        match (tls, short_timeout) {
            (false, false) => &self.plain,
            (true, false) => &self.tls,
            (false, true) => &self.plain_short,
            (true, true) => &self.tls_short,
        }
    }
}

/// The shared transports, built on first use.
pub fn shared_transports() -> Result<&'static SharedTransports> {
    TRANSPORTS.get_or_try_init(SharedTransports::build)
}

fn build_transport(tls: bool, short_timeout: bool) -> Result<Client> {
    let idle = if short_timeout {
        SHORT_IDLE_TIMEOUT
    } else {
        IDLE_TIMEOUT
    };
    // Server certificates are issued by the deployment's own CA and are not
    // verified here.
    let client = Client::builder()
        .connect_timeout(DIAL_TIMEOUT)
        .pool_idle_timeout(idle)
        .tcp_keepalive(idle)
        .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
        .redirect(redirect::Policy::none())
        .danger_accept_invalid_certs(tls)
        .build()?;
    Ok(client)
}

/// A fresh transport per test, so pooled connections never outlive the
/// runtime of the test that opened them.
#[cfg(test)]
pub(crate) fn test_transport() -> &'static Client {
    Box::leak(Box::new(
        build_transport(false, true).expect("test transport"),
    ))
}
