//! DBCluster operator: security core for multi-node database deployments
//!
//! This crate keeps the credentials of a database deployment in place
//! (tokens, signed JWTs, certificate authorities, encryption keyfolders),
//! builds the HTTP clients the operator uses to talk to the deployment, and
//! drives the lifecycle of backup resources.

pub mod client;
pub mod controller;
pub mod crd;
pub mod error;
pub mod store;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
