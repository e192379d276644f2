//! Error types for swarm-telemetry

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving or querying the telemetry service
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    // =========================================================================
    // Construction Errors
    // =========================================================================
    /// No instance is registered under the requested service name
    #[error("not found telemetry service: {name}")]
    NotFoundService { name: String },

    /// Instances exist but none of their addresses accepted a connection
    #[error("could not connect to telemetry service {name} ({attempts} address(es) tried)")]
    ConnectionFailed { name: String, attempts: usize },

    /// Endpoint address could not be turned into a client
    #[error("Invalid endpoint address {address}: {reason}")]
    InvalidEndpoint { address: String, reason: String },

    // =========================================================================
    // Registry Errors
    // =========================================================================
    /// Registry has no record of the service
    #[error("service not registered: {0}")]
    RegistryNotFound(String),

    /// Registry backend failed
    #[error("service registry error: {0}")]
    Registry(String),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Query Errors
    // =========================================================================
    /// Prometheus connection error
    #[error("Prometheus connection error: {0}")]
    PrometheusConnection(#[source] reqwest::Error),

    /// Query did not complete within the configured timeout
    #[error("Prometheus query timed out after {0:?}")]
    QueryTimeout(Duration),

    /// Prometheus query error
    #[error("Prometheus query error: {0}")]
    PrometheusQuery(String),

    /// Prometheus response parse error
    #[error("Failed to parse Prometheus response: {0}")]
    PrometheusResponseParse(String),

    /// Result had a different type than the accessor expects
    #[error("expected {expected} result, got {actual}")]
    UnexpectedResultType {
        expected: &'static str,
        actual: &'static str,
    },

    /// Query returned an empty vector where a sample was required
    #[error("no data returned for query: {query}")]
    NoData { query: String },

    /// Caller-supplied identifier cannot be embedded in a selector
    #[error("invalid value for label {label}: {reason}")]
    InvalidLabelValue { label: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors raised because the backing service is unreachable
    /// rather than because a query was wrong.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::NotFoundService { .. }
                | Error::ConnectionFailed { .. }
                | Error::PrometheusConnection(_)
                | Error::QueryTimeout(_)
        )
    }
}
