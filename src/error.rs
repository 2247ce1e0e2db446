//! Error types for the DBCluster operator

use thiserror::Error;

/// Store operation that failed, used to give [`Error::StoreError`] context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Get,
    Create,
    Delete,
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreOperation::Get => write!(f, "get"),
            StoreOperation::Create => write!(f, "create"),
            StoreOperation::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// The named object does not exist. Expected; drives create branches.
    #[error("Secret '{name}' not found")]
    NotFound { name: String },

    /// The named object was created concurrently by someone else.
    #[error("Secret '{name}' already exists")]
    AlreadyExists { name: String },

    /// Any other failure talking to the secret store
    #[error("Failed to {operation} secret '{name}': {source}")]
    StoreError {
        operation: StoreOperation,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// A store call did not finish before its deadline
    #[error("Timed out trying to {operation} secret '{name}'")]
    Timeout {
        operation: StoreOperation,
        name: String,
    },

    /// Prerequisite material exists but is malformed
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Authentication was required by the caller but is not available
    #[error("Authentication policy violation: {0}")]
    PolicyError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Certificate generation failed: {0}")]
    CertificateError(#[from] rcgen::Error),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    /// Building or using a connection to a database endpoint failed
    #[error("Connection to '{dns_name}' failed: {source}")]
    ConnectionError {
        dns_name: String,
        #[source]
        source: reqwest::Error,
    },

    /// A database endpoint answered with an error status
    #[error("Request to '{dns_name}' failed with status {status}: {source}")]
    ResponseError {
        dns_name: String,
        status: u16,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    /// Transient failures that deserve a quick requeue
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::StoreError { .. }
                | Error::Timeout { .. }
                | Error::KubeError(_)
                | Error::ConnectionError { .. }
                | Error::HttpError(_)
        ) || matches!(self, Error::ResponseError { status, .. } if *status >= 500)
    }

    /// Short label used for the error-kind metric
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::AlreadyExists { .. } => "already_exists",
            Error::StoreError { .. } | Error::Timeout { .. } | Error::KubeError(_) => "store",
            Error::ValidationError(_) => "validation",
            Error::PolicyError(_) => "policy",
            Error::ConfigError(_) => "config",
            Error::CertificateError(_) => "certificate",
            Error::JwtError(_) => "jwt",
            Error::ConnectionError { .. } | Error::HttpError(_) => "connection",
            Error::ResponseError { .. } => "response",
            Error::SerializationError(_) => "serialization",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
