//! Prometheus HTTP API client
//!
//! Executes instant queries against one endpoint with a fixed per-request
//! timeout and decodes the result into [`QueryValue`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::value::{QueryValue, RawData};
use crate::error::{Error, Result};

// =============================================================================
// Prometheus Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct PrometheusResponse {
    status: String,
    #[serde(default)]
    data: Option<RawData>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// Decoded result of an instant query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub value: QueryValue,
    /// Advisory warnings reported alongside a successful result
    pub warnings: Vec<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Client bound to a single Prometheus endpoint
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_url: String,
    client: Client,
    query_timeout: Duration,
}

impl PrometheusClient {
    /// Create a client for `base_url` (absolute, with scheme).
    pub fn new(base_url: &str, query_timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let parsed = Url::parse(&base_url).map_err(|e| Error::InvalidEndpoint {
            address: base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(Error::InvalidEndpoint {
                address: base_url,
                reason: "expected an http(s) URL with a host".to_string(),
            });
        }

        let client = Client::builder()
            .connect_timeout(query_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            query_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Check that the endpoint answers `path` with a success status
    #[instrument(skip(self), fields(endpoint = %self.base_url))]
    pub async fn probe(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .timeout(self.query_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::PrometheusQuery(format!(
                "Probe {} failed: {}",
                path,
                response.status()
            )))
        }
    }

    /// Evaluate `expr` at the current instant (UTC).
    pub async fn query(&self, expr: &str) -> Result<QueryOutcome> {
        self.query_at(expr, Utc::now()).await
    }

    /// Evaluate `expr` at `time`.
    #[instrument(skip(self), fields(endpoint = %self.base_url))]
    pub(crate) async fn query_at(&self, expr: &str, time: DateTime<Utc>) -> Result<QueryOutcome> {
        let url = format!(
            "{}/api/v1/query?query={}&time={}",
            self.base_url,
            urlencoding::encode(expr),
            format_time(time)
        );

        debug!("Querying Prometheus: {}", expr);

        let response = self
            .client
            .get(&url)
            .timeout(self.query_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        // Error responses (400, 422, 503) still carry a JSON envelope.
        let prom_response: PrometheusResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(Error::PrometheusQuery(format!(
                    "Query failed with status: {}",
                    status
                )))
            }
            Err(e) => return Err(Error::PrometheusResponseParse(e.to_string())),
        };

        decode(prom_response)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::QueryTimeout(self.query_timeout)
        } else {
            Error::PrometheusConnection(e)
        }
    }
}

fn decode(response: PrometheusResponse) -> Result<QueryOutcome> {
    if response.status != "success" {
        return Err(Error::PrometheusQuery(format!(
            "{}: {}",
            response.error_type.as_deref().unwrap_or(response.status.as_str()),
            response.error.as_deref().unwrap_or("no error message")
        )));
    }

    let data = response
        .data
        .ok_or_else(|| Error::PrometheusResponseParse("missing data field".into()))?;

    Ok(QueryOutcome {
        value: QueryValue::try_from(data)?,
        warnings: response.warnings,
    })
}

/// Unix seconds with millisecond precision, as accepted by the `time` parameter.
fn format_time(time: DateTime<Utc>) -> String {
    let millis = time.timestamp_millis();
    format!("{}.{:03}", millis.div_euclid(1000), millis.rem_euclid(1000))
}
