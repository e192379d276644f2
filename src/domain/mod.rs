//! Domain Layer
//!
//! Value objects and the ports the adapters implement.
//!
//! # Usage
//!
//! ```ignore
//! use swarm_telemetry::domain::{ServiceRegistry, Telemetry};
//!
//! async fn busiest_node<T: Telemetry + ?Sized>(telemetry: &T) -> Result<Option<String>> {
//!     let mut busiest = None;
//!     for instance in telemetry.node_meta(&[]).await?.into_keys() {
//!         let rate = telemetry.node_cpu_used_rate(&instance).await?;
//!         // ...
//!     }
//!     Ok(busiest)
//! }
//! ```

pub mod ports;

pub use ports::{
    NodeMeta, RegisteredService, ServiceMeta, ServiceNode, ServiceRegistry, Telemetry,
};
