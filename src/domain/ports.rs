//! Domain Ports (Port/Adapter Pattern)
//!
//! The two seams of the crate: [`Telemetry`], the capability handed to
//! callers, and [`ServiceRegistry`], the collaborator used to find the
//! backing metrics service.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      Ports (Traits)                        │
//! │         Telemetry          │        ServiceRegistry        │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                     Adapters (Impls)                       │
//! │ PrometheusTelemetry │ StaticRegistry │ KubernetesRegistry  │
//! └───────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Identity of a Swarm node as reported by the `node_meta` series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Swarm node id
    pub id: String,
    /// Node host name
    pub host_name: String,
    /// Node IP address
    pub ip_address: String,
}

/// A running container of a service, identified by the node it runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMeta {
    /// Swarm node id owning the container
    pub id: String,
    /// Logical service name
    pub name: String,
}

/// One network endpoint of a registered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub id: String,
    /// `host:port`, optionally with a scheme
    pub address: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ServiceNode {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A service entry returned by a registry lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredService {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub nodes: Vec<ServiceNode>,
}

// =============================================================================
// Registry Port
// =============================================================================

/// Port for resolving a logical service name to network endpoints.
///
/// Implementations report an unknown name as
/// [`Error::RegistryNotFound`](crate::Error::RegistryNotFound) so callers
/// can tell it apart from a failing backend. Listing order is significant:
/// callers try nodes in the order returned.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Look up every registered instance of `name`.
    async fn lookup(&self, name: &str) -> Result<Vec<RegisteredService>>;
}

// =============================================================================
// Telemetry Port
// =============================================================================

/// Resource metrics for Swarm nodes and services.
///
/// Node accessors take the instance address (the `instance` label, as keyed
/// by [`Telemetry::node_meta`]). Service accessors take the logical service
/// name and optionally narrow to one node id.
///
/// # Example
///
/// ```ignore
/// let telemetry = swarm_telemetry::create(&registry, "prometheus", &config).await?;
/// for (instance, node) in telemetry.node_meta(&[]).await? {
///     let cores = telemetry.node_cpu_core_count(&instance).await?;
///     println!("{} ({}): {} cores", node.host_name, node.ip_address, cores);
/// }
/// ```
#[async_trait]
pub trait Telemetry: Send + Sync {
    /// Node metadata keyed by instance address; `ids` filters by node id,
    /// an empty slice returns every reporting node.
    async fn node_meta(&self, ids: &[&str]) -> Result<HashMap<String, NodeMeta>>;

    /// Number of distinct CPUs on the node.
    async fn node_cpu_core_count(&self, instance: &str) -> Result<i32>;

    /// CPU utilisation in percent, averaged over the last five minutes.
    async fn node_cpu_used_rate(&self, instance: &str) -> Result<f32>;

    async fn node_mem_total_bytes(&self, instance: &str) -> Result<i64>;

    /// Total minus available memory.
    async fn node_mem_used_bytes(&self, instance: &str) -> Result<i64>;

    /// Bytes per second received, over a one minute window.
    async fn node_network_receive_bytes(&self, instance: &str) -> Result<i64>;

    /// Bytes per second transmitted, over a one minute window.
    async fn node_network_transmit_bytes(&self, instance: &str) -> Result<i64>;

    async fn node_filesystem_size_bytes(&self, instance: &str) -> Result<i64>;

    /// Size minus available filesystem bytes.
    async fn node_filesystem_used_bytes(&self, instance: &str) -> Result<i64>;

    /// Running containers of `name`, in the order Prometheus returns them.
    async fn service_meta(&self, name: &str) -> Result<Vec<ServiceMeta>>;

    /// Memory used by all containers of `name`, or only those on `node_id`.
    async fn service_mem_used_bytes(&self, name: &str, node_id: Option<&str>) -> Result<i64>;

    async fn service_network_receive_bytes(
        &self,
        name: &str,
        node_id: Option<&str>,
    ) -> Result<i64>;

    async fn service_network_transmit_bytes(
        &self,
        name: &str,
        node_id: Option<&str>,
    ) -> Result<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_node_metadata() {
        let node = ServiceNode::new("prom-0", "10.0.0.5:9090").with_metadata("zone", "a");

        assert_eq!(node.id, "prom-0");
        assert_eq!(node.address, "10.0.0.5:9090");
        assert_eq!(node.metadata.get("zone").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_node_meta_serializes() {
        let meta = NodeMeta {
            id: "xmxzh74mzu19nhbl4iwdnc79i".into(),
            host_name: "worker-1".into(),
            ip_address: "10.0.0.11".into(),
        };

        let json = serde_json::to_string(&meta).unwrap();

        assert!(json.contains("\"id\":\"xmxzh74mzu19nhbl4iwdnc79i\""));
        assert!(json.contains("\"host_name\":\"worker-1\""));
        assert!(json.contains("\"ip_address\":\"10.0.0.11\""));
    }

    #[test]
    fn test_registered_service_defaults() {
        let yaml = "name: prometheus\nnodes:\n  - id: a\n    address: 10.0.0.5:9090\n";
        let svc: RegisteredService = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(svc.name, "prometheus");
        assert!(svc.version.is_none());
        assert_eq!(svc.nodes.len(), 1);
        assert!(svc.nodes[0].metadata.is_empty());
    }
}
