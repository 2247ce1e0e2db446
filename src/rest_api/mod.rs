//! HTTP endpoint for probes and metrics
//!
//! Serves `/health` for liveness probes and, with the `metrics` feature,
//! `/metrics` in the Prometheus text format.

mod handlers;
mod server;

pub use handlers::HealthResponse;
pub use server::{router, run_server, serve, DEFAULT_BIND_ADDR};
