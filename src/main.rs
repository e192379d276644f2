//! swarm-telemetry CLI
//!
//! Resolves the telemetry service and prints node or service resource
//! figures as JSON.
//!
//! ```text
//! swarm-telemetry --address 10.0.0.5:9090 nodes
//! swarm-telemetry --registry-file registry.yaml node 10.0.0.11:9100
//! swarm-telemetry --kube-namespace monitoring service api --node xmxzh74mzu19
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swarm_telemetry::{
    KubernetesRegistry, ServiceRegistry, StaticRegistry, Telemetry, TelemetryConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Query Swarm node and service resource usage from Prometheus
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Logical name of the telemetry service in the registry
    #[arg(long, env = "TELEMETRY_SERVICE", default_value = "prometheus")]
    service: String,

    /// Register these addresses for the service instead of using a registry
    #[arg(long = "address", env = "TELEMETRY_ADDRESSES", value_delimiter = ',')]
    addresses: Vec<String>,

    /// YAML file describing a static registry
    #[arg(long, env = "REGISTRY_FILE")]
    registry_file: Option<PathBuf>,

    /// Namespace whose Endpoints are used as the registry
    #[arg(long, env = "KUBE_NAMESPACE", default_value = "monitoring")]
    kube_namespace: String,

    /// Only use Endpoints ports with this name
    #[arg(long, env = "KUBE_PORT_NAME")]
    kube_port_name: Option<String>,

    /// Per-query timeout in seconds
    #[arg(long, env = "QUERY_TIMEOUT_SECONDS", default_value = "5")]
    query_timeout_seconds: u64,

    /// Accept endpoints without probing them first
    #[arg(long, env = "NO_PROBE")]
    no_probe: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: Level,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Metadata of reporting nodes, keyed by instance
    Nodes {
        /// Restrict to these node ids
        #[arg(long = "id")]
        ids: Vec<String>,
    },
    /// CPU, memory, network and filesystem figures of one node
    Node {
        /// Instance address as reported by `nodes`
        instance: String,
    },
    /// Running containers of a service
    Services { name: String },
    /// Memory and network figures of a service
    Service {
        name: String,
        /// Restrict to containers on this node id
        #[arg(long)]
        node: Option<String>,
    },
}

// =============================================================================
// Main
// =============================================================================

/// Exit status when the telemetry service cannot be reached (EX_UNAVAILABLE).
const EXIT_UNAVAILABLE: u8 = 69;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    match execute(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<swarm_telemetry::Error>() {
        Some(e) if e.is_unavailable() => EXIT_UNAVAILABLE,
        _ => 1,
    }
}

async fn execute(args: &Args) -> anyhow::Result<()> {
    let config = TelemetryConfig {
        query_timeout: Duration::from_secs(args.query_timeout_seconds),
        probe_on_connect: !args.no_probe,
        ..Default::default()
    };

    let registry = build_registry(args).await?;
    let telemetry = swarm_telemetry::create(registry.as_ref(), &args.service, &config)
        .await
        .with_context(|| format!("connecting to telemetry service {}", args.service))?;

    let output = run(telemetry.as_ref(), &args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

async fn build_registry(args: &Args) -> anyhow::Result<Box<dyn ServiceRegistry>> {
    if !args.addresses.is_empty() {
        debug!("Using {} address(es) from the command line", args.addresses.len());
        return Ok(Box::new(
            StaticRegistry::new().with_service(&args.service, args.addresses.iter().cloned()),
        ));
    }

    if let Some(path) = &args.registry_file {
        debug!("Using registry file {}", path.display());
        let registry = StaticRegistry::from_yaml_file(path)
            .with_context(|| format!("loading registry file {}", path.display()))?;
        return Ok(Box::new(registry));
    }

    info!("Using Kubernetes Endpoints in namespace {}", args.kube_namespace);
    let client = kube::Client::try_default()
        .await
        .context("creating Kubernetes client")?;
    let mut registry = KubernetesRegistry::new(client, args.kube_namespace.clone());
    if let Some(port_name) = &args.kube_port_name {
        registry = registry.with_port_name(port_name.clone());
    }
    Ok(Box::new(registry))
}

async fn run(telemetry: &dyn Telemetry, command: &Command) -> anyhow::Result<serde_json::Value> {
    let output = match command {
        Command::Nodes { ids } => {
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            serde_json::to_value(telemetry.node_meta(&ids).await?)?
        }
        Command::Node { instance } => json!({
            "instance": instance,
            "cpu_core_count": telemetry.node_cpu_core_count(instance).await?,
            "cpu_used_rate": telemetry.node_cpu_used_rate(instance).await?,
            "mem_total_bytes": telemetry.node_mem_total_bytes(instance).await?,
            "mem_used_bytes": telemetry.node_mem_used_bytes(instance).await?,
            "network_receive_bytes": telemetry.node_network_receive_bytes(instance).await?,
            "network_transmit_bytes": telemetry.node_network_transmit_bytes(instance).await?,
            "filesystem_size_bytes": telemetry.node_filesystem_size_bytes(instance).await?,
            "filesystem_used_bytes": telemetry.node_filesystem_used_bytes(instance).await?,
        }),
        Command::Services { name } => serde_json::to_value(telemetry.service_meta(name).await?)?,
        Command::Service { name, node } => {
            let node = node.as_deref();
            json!({
                "name": name,
                "node": node,
                "mem_used_bytes": telemetry.service_mem_used_bytes(name, node).await?,
                "network_receive_bytes": telemetry.service_network_receive_bytes(name, node).await?,
                "network_transmit_bytes": telemetry.service_network_transmit_bytes(name, node).await?,
            })
        }
    };
    Ok(output)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let filter = EnvFilter::from_default_env()
        .add_directive(args.log_level.into())
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("kube=info".parse().expect("static directive"))
        .add_directive("tower=warn".parse().expect("static directive"));

    // Logs go to stderr so stdout stays valid JSON.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_addresses() {
        let args = Args::try_parse_from([
            "swarm-telemetry",
            "--address",
            "10.0.0.5:9090,10.0.0.6:9090",
            "nodes",
            "--id",
            "a",
            "--id",
            "b",
        ])
        .unwrap();

        assert_eq!(args.addresses, vec!["10.0.0.5:9090", "10.0.0.6:9090"]);
        match args.command {
            Command::Nodes { ids } => assert_eq!(ids, vec!["a", "b"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_args_service_with_node() {
        let args =
            Args::try_parse_from(["swarm-telemetry", "service", "api", "--node", "n1"]).unwrap();

        assert_eq!(args.service, "prometheus");
        assert_eq!(args.query_timeout_seconds, 5);
        match args.command {
            Command::Service { name, node } => {
                assert_eq!(name, "api");
                assert_eq!(node.as_deref(), Some("n1"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_args_log_level() {
        let args =
            Args::try_parse_from(["swarm-telemetry", "--log-level", "debug", "nodes"]).unwrap();
        assert_eq!(args.log_level, Level::DEBUG);

        let args = Args::try_parse_from(["swarm-telemetry", "nodes"]).unwrap();
        assert_eq!(args.log_level, Level::WARN);

        let result = Args::try_parse_from(["swarm-telemetry", "--log-level", "verbose", "nodes"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_exit_status_for_unreachable_service() {
        let err = anyhow::Error::from(swarm_telemetry::Error::ConnectionFailed {
            name: "prometheus".into(),
            attempts: 2,
        })
        .context("connecting to telemetry service prometheus");
        assert_eq!(exit_status(&err), EXIT_UNAVAILABLE);

        let err = anyhow::Error::from(swarm_telemetry::Error::NoData {
            query: "up".into(),
        });
        assert_eq!(exit_status(&err), 1);

        assert_eq!(exit_status(&anyhow::anyhow!("bad registry file")), 1);
    }
}
