//! Static Registry Adapter
//!
//! Implements the `ServiceRegistry` port from an in-memory table, filled
//! programmatically or from a YAML file:
//!
//! ```yaml
//! services:
//!   prometheus:
//!     - address: 10.0.0.5:9090
//!     - id: prom-b
//!       address: http://10.0.0.6:9090
//!       metadata:
//!         zone: b
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::domain::ports::{RegisteredService, ServiceNode, ServiceRegistry};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    services: BTreeMap<String, Vec<NodeEntry>>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    #[serde(default)]
    id: Option<String>,
    address: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// In-memory service registry.
///
/// Nodes are returned in registration order.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    services: RwLock<BTreeMap<String, Vec<ServiceNode>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register) for several addresses.
    pub fn with_service<I, S>(self, name: &str, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for address in addresses {
            self.register(name, address);
        }
        self
    }

    /// Append an address to `name`; the address doubles as the node id.
    pub fn register(&self, name: &str, address: impl Into<String>) {
        let address = address.into();
        self.register_node(name, ServiceNode::new(address.clone(), address));
    }

    pub fn register_node(&self, name: &str, node: ServiceNode) {
        debug!(service = %name, address = %node.address, "Registering node");
        self.services
            .write()
            .entry(name.to_string())
            .or_default()
            .push(node);
    }

    /// Remove `name` entirely. Returns false if it was not registered.
    pub fn deregister(&self, name: &str) -> bool {
        self.services.write().remove(name).is_some()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: RegistryFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Invalid registry file: {}", e)))?;

        let registry = Self::new();
        for (name, entries) in file.services {
            for entry in entries {
                let id = entry.id.unwrap_or_else(|| entry.address.clone());
                registry.register_node(
                    &name,
                    ServiceNode {
                        id,
                        address: entry.address,
                        metadata: entry.metadata,
                    },
                );
            }
        }
        Ok(registry)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }
}

#[async_trait]
impl ServiceRegistry for StaticRegistry {
    async fn lookup(&self, name: &str) -> Result<Vec<RegisteredService>> {
        let services = self.services.read();
        let nodes = services
            .get(name)
            .ok_or_else(|| Error::RegistryNotFound(name.to_string()))?;

        Ok(vec![RegisteredService {
            name: name.to_string(),
            version: None,
            nodes: nodes.clone(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_lookup_preserves_registration_order() {
        let registry = StaticRegistry::new().with_service("prometheus", ["10.0.0.5:9090"]);
        registry.register("prometheus", "10.0.0.6:9090");

        let services = registry.lookup("prometheus").await.unwrap();

        assert_eq!(services.len(), 1);
        let addresses: Vec<_> = services[0].nodes.iter().map(|n| n.address.as_str()).collect();
        assert_eq!(addresses, vec!["10.0.0.5:9090", "10.0.0.6:9090"]);
        assert_eq!(services[0].nodes[0].id, "10.0.0.5:9090");
    }

    #[tokio::test]
    async fn test_lookup_unknown_is_not_found() {
        let registry = StaticRegistry::new();
        assert_matches!(
            registry.lookup("prometheus").await,
            Err(Error::RegistryNotFound(name)) if name == "prometheus"
        );
    }

    #[tokio::test]
    async fn test_deregister() {
        let registry = StaticRegistry::new().with_service("prometheus", ["10.0.0.5:9090"]);

        assert!(registry.deregister("prometheus"));
        assert!(!registry.deregister("prometheus"));
        assert!(registry.lookup("prometheus").await.is_err());
    }

    #[tokio::test]
    async fn test_from_yaml_str() {
        let yaml = r#"
services:
  prometheus:
    - address: 10.0.0.5:9090
    - id: prom-b
      address: http://10.0.0.6:9090
      metadata:
        zone: b
"#;
        let registry = StaticRegistry::from_yaml_str(yaml).unwrap();
        let services = registry.lookup("prometheus").await.unwrap();
        let nodes = &services[0].nodes;

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "10.0.0.5:9090");
        assert_eq!(nodes[1].id, "prom-b");
        assert_eq!(nodes[1].address, "http://10.0.0.6:9090");
        assert_eq!(nodes[1].metadata.get("zone").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_from_yaml_str_rejects_missing_address() {
        let yaml = "services:\n  prometheus:\n    - id: a\n";
        assert_matches!(StaticRegistry::from_yaml_str(yaml), Err(Error::Config(_)));
    }

    #[test]
    fn test_from_missing_file() {
        assert_matches!(
            StaticRegistry::from_yaml_file("/nonexistent/registry.yaml"),
            Err(Error::Io(_))
        );
    }
}
