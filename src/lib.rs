//! swarm-telemetry - Resource Telemetry for Swarm Nodes and Services
//!
//! Resolves a Prometheus endpoint by logical service name through a service
//! registry and answers resource questions about cluster nodes and services
//! (CPU, memory, network, filesystem) by issuing PromQL instant queries.
//!
//! # Architecture
//!
//! ```text
//! caller ─▶ create() ─▶ ServiceRegistry::lookup ─▶ PrometheusTelemetry
//!                                                      │
//!   typed accessor ─▶ PromQL (query::builder) ─▶ PrometheusClient ─▶ QueryValue
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Prometheus telemetry backend and registry implementations
//! - [`config`] - Adapter configuration
//! - [`domain`] - Value objects and ports
//! - [`error`] - Error types
//! - [`query`] - PromQL builder, HTTP client, typed results

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod query;

use std::sync::Arc;

pub use adapters::{KubernetesRegistry, PrometheusTelemetry, StaticRegistry};
pub use config::{LabelConfig, TelemetryConfig};
pub use domain::{NodeMeta, RegisteredService, ServiceMeta, ServiceNode, ServiceRegistry, Telemetry};
pub use error::{Error, Result};

/// Resolve `service_name` through `registry` and return the telemetry
/// capability bound to the first reachable endpoint.
pub async fn create(
    registry: &dyn ServiceRegistry,
    service_name: &str,
    config: &TelemetryConfig,
) -> Result<Arc<dyn Telemetry>> {
    let telemetry = PrometheusTelemetry::connect(registry, service_name, config).await?;
    Ok(Arc::new(telemetry))
}
