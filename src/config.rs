//! Adapter configuration

use std::time::Duration;

use crate::error::{Error, Result};

/// Default per-query timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Label names that tie container series to Swarm nodes and services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelConfig {
    /// Label carrying the Swarm node id on container and node_meta series
    pub node_id: String,

    /// Label carrying the logical service name on container series
    pub service_name: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            node_id: "container_label_com_docker_swarm_node_id".to_string(),
            service_name: "container_env_cdm_service_name".to_string(),
        }
    }
}

/// Configuration for connecting to and querying the telemetry service
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Timeout applied to every query, measured from invocation
    pub query_timeout: Duration,

    /// Scheme prefixed to registry addresses that carry none
    pub default_scheme: String,

    /// Probe each candidate endpoint before accepting it
    pub probe_on_connect: bool,

    /// Path requested by the connection probe
    pub probe_path: String,

    /// Label names used in generated selectors
    pub labels: LabelConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            default_scheme: "http".to_string(),
            probe_on_connect: true,
            probe_path: "/-/ready".to_string(),
            labels: LabelConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Reject settings that would make every query fail.
    pub fn validate(&self) -> Result<()> {
        if self.query_timeout.is_zero() {
            return Err(Error::Config("query timeout must be greater than zero".into()));
        }
        if !matches!(self.default_scheme.as_str(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported scheme: {}",
                self.default_scheme
            )));
        }
        if !self.probe_path.starts_with('/') {
            return Err(Error::Config(format!(
                "probe path must start with '/': {}",
                self.probe_path
            )));
        }
        if self.labels.node_id.is_empty() || self.labels.service_name.is_empty() {
            return Err(Error::Config("label names must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();

        assert_eq!(config.query_timeout, Duration::from_secs(5));
        assert_eq!(config.default_scheme, "http");
        assert!(config.probe_on_connect);
        assert_eq!(config.probe_path, "/-/ready");
        assert_eq!(
            config.labels.node_id,
            "container_label_com_docker_swarm_node_id"
        );
        assert_eq!(config.labels.service_name, "container_env_cdm_service_name");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = TelemetryConfig {
            query_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_scheme() {
        let config = TelemetryConfig {
            default_scheme: "ftp".into(),
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(Error::Config(msg)) if msg.contains("ftp"));
    }

    #[test]
    fn test_validate_rejects_relative_probe_path() {
        let config = TelemetryConfig {
            probe_path: "-/ready".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
