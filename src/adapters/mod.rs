//! Infrastructure Adapters
//!
//! Implementations of the domain ports.
//!
//! # Usage
//!
//! ```ignore
//! use swarm_telemetry::adapters::{PrometheusTelemetry, StaticRegistry};
//! use swarm_telemetry::TelemetryConfig;
//!
//! let registry = StaticRegistry::new().with_service("prometheus", ["10.0.0.5:9090"]);
//! let telemetry =
//!     PrometheusTelemetry::connect(&registry, "prometheus", &TelemetryConfig::default()).await?;
//! let used = telemetry.node_mem_used_bytes("10.0.0.5:9100").await?;
//! ```

mod kubernetes;
mod prometheus;
mod static_registry;

pub use kubernetes::{nodes_from_endpoints, KubernetesRegistry};
pub use prometheus::{normalize_address, PrometheusTelemetry};
pub use static_registry::StaticRegistry;
