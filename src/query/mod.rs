//! Query module
//!
//! PromQL construction, the Prometheus HTTP client, and typed results.

pub mod builder;
mod client;
mod proptest;
pub mod value;

pub use builder::Selector;
pub use client::{PrometheusClient, QueryOutcome};
pub use value::{QueryValue, Sample, Series};
