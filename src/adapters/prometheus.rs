//! Prometheus Telemetry Adapter
//!
//! Implements the `Telemetry` port by translating each accessor into one
//! PromQL instant query against a Prometheus endpoint resolved through a
//! `ServiceRegistry`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{LabelConfig, TelemetryConfig};
use crate::domain::ports::{NodeMeta, ServiceMeta, ServiceRegistry, Telemetry};
use crate::error::{Error, Result};
use crate::query::builder::{self, check_identifier, Selector};
use crate::query::value::first_value;
use crate::query::{PrometheusClient, QueryValue, Sample};

const INSTANCE_LABEL: &str = "instance";
const NODE_ID_LABEL: &str = "node_id";
const NODE_NAME_LABEL: &str = "node_name";
const NODE_IP_LABEL: &str = "node_ip";

const CPU_RATE_WINDOW: Duration = Duration::from_secs(300);
const NETWORK_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Add the default scheme to a registry address that carries none.
///
/// An address that already names a scheme keeps it (lowercased), so an
/// unsupported one is rejected when the client is built.
pub fn normalize_address(address: &str, default_scheme: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    match address.split_once("://") {
        Some((scheme, rest)) => format!("{}://{}", scheme.to_ascii_lowercase(), rest),
        None => format!("{}://{}", default_scheme, address),
    }
}

/// Prometheus-backed telemetry adapter.
///
/// Bound to one endpoint for its whole lifetime.
pub struct PrometheusTelemetry {
    client: PrometheusClient,
    labels: LabelConfig,
}

impl PrometheusTelemetry {
    /// Resolve `service_name` through `registry` and bind to the first
    /// address that accepts a connection.
    #[instrument(skip(registry, config))]
    pub async fn connect(
        registry: &dyn ServiceRegistry,
        service_name: &str,
        config: &TelemetryConfig,
    ) -> Result<Self> {
        if service_name.trim().is_empty() {
            return Err(Error::Config("service name must not be empty".into()));
        }
        config.validate()?;

        let services = match registry.lookup(service_name).await {
            Ok(services) => services,
            Err(Error::RegistryNotFound(_)) => {
                error!("Not found service ({})", service_name);
                return Err(Error::NotFoundService {
                    name: service_name.to_string(),
                });
            }
            Err(e) => {
                error!("Could not get service {}: {}", service_name, e);
                return Err(e);
            }
        };

        if services.is_empty() {
            error!("Not found service ({})", service_name);
            return Err(Error::NotFoundService {
                name: service_name.to_string(),
            });
        }

        let mut attempts = 0;
        for service in &services {
            for node in &service.nodes {
                attempts += 1;
                let address = normalize_address(&node.address, &config.default_scheme);

                match Self::open(&address, config).await {
                    Ok(client) => {
                        info!(
                            service = %service_name,
                            node = %node.id,
                            "Connected to telemetry service at {}",
                            address
                        );
                        return Ok(Self::from_client(client, config.labels.clone()));
                    }
                    Err(e) => debug!(node = %node.id, "Connection to {} failed: {}", address, e),
                }
            }
        }

        Err(Error::ConnectionFailed {
            name: service_name.to_string(),
            attempts,
        })
    }

    async fn open(address: &str, config: &TelemetryConfig) -> Result<PrometheusClient> {
        let client = PrometheusClient::new(address, config.query_timeout)?;
        if config.probe_on_connect {
            client.probe(&config.probe_path).await?;
        }
        Ok(client)
    }

    /// Wrap an already constructed client.
    pub fn from_client(client: PrometheusClient, labels: LabelConfig) -> Self {
        Self { client, labels }
    }

    /// Endpoint this adapter is bound to.
    pub fn endpoint(&self) -> &str {
        self.client.base_url()
    }

    async fn query(&self, expr: &str) -> Result<QueryValue> {
        let outcome = self.client.query(expr).await?;
        if !outcome.warnings.is_empty() {
            warn!("Query {} returned warnings: {:?}", expr, outcome.warnings);
        }
        Ok(outcome.value)
    }

    async fn query_vector(&self, expr: &str) -> Result<Vec<Sample>> {
        self.query(expr).await?.into_vector()
    }

    async fn query_first(&self, expr: &str) -> Result<f64> {
        let samples = self.query_vector(expr).await?;
        first_value(&samples, expr)
    }

    fn instance_selector(metric: &str, instance: &str) -> Result<Selector> {
        check_identifier(INSTANCE_LABEL, instance)?;
        Ok(Selector::new(metric).eq(INSTANCE_LABEL, instance))
    }

    /// Running-container selector for `name`, optionally narrowed to a node.
    fn container_selector(
        &self,
        metric: &str,
        name: &str,
        node_id: Option<&str>,
    ) -> Result<Selector> {
        check_identifier(&self.labels.service_name, name)?;
        let mut selector = Selector::new(metric)
            .ne("image", "")
            .eq(&self.labels.service_name, name);
        if let Some(node_id) = node_id {
            check_identifier(&self.labels.node_id, node_id)?;
            selector = selector.eq(&self.labels.node_id, node_id);
        }
        Ok(selector)
    }
}

impl std::fmt::Debug for PrometheusTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusTelemetry")
            .field("endpoint", &self.client.base_url())
            .field("query_timeout", &self.client.query_timeout())
            .finish()
    }
}

#[async_trait]
impl Telemetry for PrometheusTelemetry {
    #[instrument(skip(self))]
    async fn node_meta(&self, ids: &[&str]) -> Result<HashMap<String, NodeMeta>> {
        let mut selector = Selector::new("node_meta");
        if !ids.is_empty() {
            for id in ids {
                check_identifier(&self.labels.node_id, id)?;
            }
            selector = selector.any_of(&self.labels.node_id, ids);
        }

        let samples = self.query_vector(&selector.to_string()).await?;
        let nodes = samples
            .iter()
            .map(|s| {
                (
                    s.label(INSTANCE_LABEL).to_string(),
                    NodeMeta {
                        id: s.label(NODE_ID_LABEL).to_string(),
                        host_name: s.label(NODE_NAME_LABEL).to_string(),
                        ip_address: s.label(NODE_IP_LABEL).to_string(),
                    },
                )
            })
            .collect();

        Ok(nodes)
    }

    async fn node_cpu_core_count(&self, instance: &str) -> Result<i32> {
        let selector = Self::instance_selector("node_cpu_seconds_total", instance)?;
        let query = builder::count(builder::count_by(&selector, "cpu"));
        Ok(self.query_first(&query).await? as i32)
    }

    async fn node_cpu_used_rate(&self, instance: &str) -> Result<f32> {
        let selector =
            Self::instance_selector("node_cpu_seconds_total", instance)?.eq("mode", "idle");
        let query = format!(
            "100 - ({} * 100)",
            builder::avg(builder::irate(&selector, CPU_RATE_WINDOW))
        );
        Ok(self.query_first(&query).await? as f32)
    }

    async fn node_mem_total_bytes(&self, instance: &str) -> Result<i64> {
        let total = Self::instance_selector("node_memory_MemTotal_bytes", instance)?;
        Ok(self.query_first(&builder::sum(&total)).await? as i64)
    }

    async fn node_mem_used_bytes(&self, instance: &str) -> Result<i64> {
        let total = Self::instance_selector("node_memory_MemTotal_bytes", instance)?;
        let available = Self::instance_selector("node_memory_MemAvailable_bytes", instance)?;
        let query = format!("{} - {}", builder::sum(&total), builder::sum(&available));
        Ok(self.query_first(&query).await? as i64)
    }

    async fn node_network_receive_bytes(&self, instance: &str) -> Result<i64> {
        let selector = Self::instance_selector("node_network_receive_bytes_total", instance)?;
        let query = builder::sum(builder::rate(&selector, NETWORK_RATE_WINDOW));
        Ok(self.query_first(&query).await? as i64)
    }

    async fn node_network_transmit_bytes(&self, instance: &str) -> Result<i64> {
        let selector = Self::instance_selector("node_network_transmit_bytes_total", instance)?;
        let query = builder::sum(builder::rate(&selector, NETWORK_RATE_WINDOW));
        Ok(self.query_first(&query).await? as i64)
    }

    async fn node_filesystem_size_bytes(&self, instance: &str) -> Result<i64> {
        let size = Self::instance_selector("node_filesystem_size_bytes", instance)?;
        Ok(self.query_first(&size.to_string()).await? as i64)
    }

    async fn node_filesystem_used_bytes(&self, instance: &str) -> Result<i64> {
        let size = Self::instance_selector("node_filesystem_size_bytes", instance)?;
        let avail = Self::instance_selector("node_filesystem_avail_bytes", instance)?;
        let query = format!("{} - {}", size, avail);
        Ok(self.query_first(&query).await? as i64)
    }

    #[instrument(skip(self))]
    async fn service_meta(&self, name: &str) -> Result<Vec<ServiceMeta>> {
        let selector = self.container_selector("container_start_time_seconds", name, None)?;
        let samples = self.query_vector(&selector.to_string()).await?;

        Ok(samples
            .iter()
            .map(|s| ServiceMeta {
                id: s.label(&self.labels.node_id).to_string(),
                name: s.label(&self.labels.service_name).to_string(),
            })
            .collect())
    }

    async fn service_mem_used_bytes(&self, name: &str, node_id: Option<&str>) -> Result<i64> {
        let selector = self.container_selector("container_memory_usage_bytes", name, node_id)?;
        Ok(self.query_first(&builder::sum(&selector)).await? as i64)
    }

    async fn service_network_receive_bytes(
        &self,
        name: &str,
        node_id: Option<&str>,
    ) -> Result<i64> {
        let selector =
            self.container_selector("container_network_receive_bytes_total", name, node_id)?;
        Ok(self.query_first(&builder::sum(&selector)).await? as i64)
    }

    async fn service_network_transmit_bytes(
        &self,
        name: &str,
        node_id: Option<&str>,
    ) -> Result<i64> {
        let selector =
            self.container_selector("container_network_transmit_bytes_total", name, node_id)?;
        Ok(self.query_first(&builder::sum(&selector)).await? as i64)
    }
}
