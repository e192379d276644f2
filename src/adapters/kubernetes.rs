//! Kubernetes Registry Adapter
//!
//! Implements the `ServiceRegistry` port on top of Kubernetes `Endpoints`:
//! the service name is the name of an `Endpoints` object in one namespace,
//! and every ready address/port pair becomes a node.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Endpoints;
use kube::api::Api;
use kube::Client;
use tracing::{debug, instrument};

use crate::domain::ports::{RegisteredService, ServiceNode, ServiceRegistry};
use crate::error::{Error, Result};

/// Kubernetes Endpoints-based service registry.
#[derive(Clone)]
pub struct KubernetesRegistry {
    client: Client,
    namespace: String,
    port_name: Option<String>,
}

impl KubernetesRegistry {
    /// Create a registry resolving services in `namespace`.
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            port_name: None,
        }
    }

    /// Only use endpoint ports with this name (e.g. `web`).
    pub fn with_port_name(mut self, port_name: impl Into<String>) -> Self {
        self.port_name = Some(port_name.into());
        self
    }

    fn endpoints_api(&self) -> Api<Endpoints> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

impl std::fmt::Debug for KubernetesRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesRegistry")
            .field("namespace", &self.namespace)
            .field("port_name", &self.port_name)
            .finish()
    }
}

/// Flatten ready addresses × ports into nodes, in subset order.
pub fn nodes_from_endpoints(endpoints: &Endpoints, port_name: Option<&str>) -> Vec<ServiceNode> {
    let mut nodes = Vec::new();

    for subset in endpoints.subsets.iter().flatten() {
        let ports: Vec<_> = subset
            .ports
            .iter()
            .flatten()
            .filter(|p| port_name.map_or(true, |want| p.name.as_deref() == Some(want)))
            .collect();

        for address in subset.addresses.iter().flatten() {
            for port in &ports {
                let id = address
                    .target_ref
                    .as_ref()
                    .and_then(|r| r.name.clone())
                    .unwrap_or_else(|| address.ip.clone());

                let mut node = ServiceNode::new(id, format!("{}:{}", address.ip, port.port));
                if let Some(node_name) = &address.node_name {
                    node = node.with_metadata("node_name", node_name.as_str());
                }
                if let Some(hostname) = &address.hostname {
                    node = node.with_metadata("hostname", hostname.as_str());
                }
                if let Some(name) = &port.name {
                    node = node.with_metadata("port_name", name.as_str());
                }
                nodes.push(node);
            }
        }
    }

    nodes
}

#[async_trait]
impl ServiceRegistry for KubernetesRegistry {
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn lookup(&self, name: &str) -> Result<Vec<RegisteredService>> {
        let endpoints = self
            .endpoints_api()
            .get_opt(name)
            .await?
            .ok_or_else(|| Error::RegistryNotFound(name.to_string()))?;

        let nodes = nodes_from_endpoints(&endpoints, self.port_name.as_deref());
        debug!("Resolved {} node(s) for {}", nodes.len(), name);

        Ok(vec![RegisteredService {
            name: name.to_string(),
            version: endpoints.metadata.resource_version.clone(),
            nodes,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{EndpointAddress, EndpointPort, EndpointSubset, ObjectReference};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn port(name: &str, port: i32) -> EndpointPort {
        EndpointPort {
            name: Some(name.to_string()),
            port,
            ..Default::default()
        }
    }

    fn endpoints() -> Endpoints {
        Endpoints {
            metadata: ObjectMeta {
                name: Some("prometheus".into()),
                namespace: Some("monitoring".into()),
                ..Default::default()
            },
            subsets: Some(vec![EndpointSubset {
                addresses: Some(vec![
                    EndpointAddress {
                        ip: "10.0.0.5".into(),
                        node_name: Some("worker-1".into()),
                        target_ref: Some(ObjectReference {
                            name: Some("prometheus-0".into()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    EndpointAddress {
                        ip: "10.0.0.6".into(),
                        ..Default::default()
                    },
                ]),
                ports: Some(vec![port("web", 9090), port("reloader", 8080)]),
                ..Default::default()
            }]),
        }
    }

    #[test]
    fn test_nodes_from_endpoints_all_ports() {
        let nodes = nodes_from_endpoints(&endpoints(), None);
        let addresses: Vec<_> = nodes.iter().map(|n| n.address.as_str()).collect();

        assert_eq!(
            addresses,
            vec![
                "10.0.0.5:9090",
                "10.0.0.5:8080",
                "10.0.0.6:9090",
                "10.0.0.6:8080"
            ]
        );
        assert_eq!(nodes[0].id, "prometheus-0");
        assert_eq!(nodes[2].id, "10.0.0.6");
        assert_eq!(
            nodes[0].metadata.get("node_name").map(String::as_str),
            Some("worker-1")
        );
    }

    #[test]
    fn test_nodes_from_endpoints_named_port() {
        let nodes = nodes_from_endpoints(&endpoints(), Some("web"));
        let addresses: Vec<_> = nodes.iter().map(|n| n.address.as_str()).collect();

        assert_eq!(addresses, vec!["10.0.0.5:9090", "10.0.0.6:9090"]);
        assert!(nodes
            .iter()
            .all(|n| n.metadata.get("port_name").map(String::as_str) == Some("web")));
    }

    #[test]
    fn test_nodes_from_endpoints_without_subsets() {
        let endpoints = Endpoints {
            metadata: ObjectMeta {
                name: Some("prometheus".into()),
                ..Default::default()
            },
            subsets: None,
        };
        assert!(nodes_from_endpoints(&endpoints, None).is_empty());
    }
}
