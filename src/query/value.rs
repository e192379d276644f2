//! Typed Prometheus query results
//!
//! The HTTP API encodes each result as `{resultType, result}`; this module
//! turns that into [`QueryValue`] with sample values already parsed.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Error, Result};

// =============================================================================
// Public Types
// =============================================================================

/// A single sample of an instant vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: BTreeMap<String, String>,
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    /// Label value, or the empty string when the label is absent.
    pub fn label(&self, name: &str) -> &str {
        self.metric.get(name).map(String::as_str).unwrap_or("")
    }
}

/// A series of a range vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub metric: BTreeMap<String, String>,
    pub values: Vec<(f64, f64)>,
}

/// Result of a query, tagged by result type.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Scalar { timestamp: f64, value: f64 },
    Vector(Vec<Sample>),
    Matrix(Vec<Series>),
    String { timestamp: f64, value: String },
}

impl QueryValue {
    /// Result type name as Prometheus reports it.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryValue::Scalar { .. } => "scalar",
            QueryValue::Vector(_) => "vector",
            QueryValue::Matrix(_) => "matrix",
            QueryValue::String { .. } => "string",
        }
    }

    /// Unwrap an instant vector, failing on every other result type.
    pub fn into_vector(self) -> Result<Vec<Sample>> {
        match self {
            QueryValue::Vector(samples) => Ok(samples),
            other => Err(Error::UnexpectedResultType {
                expected: "vector",
                actual: other.kind(),
            }),
        }
    }
}

/// Value of the first sample, or [`Error::NoData`] for an empty vector.
pub fn first_value(samples: &[Sample], query: &str) -> Result<f64> {
    samples
        .first()
        .map(|s| s.value)
        .ok_or_else(|| Error::NoData {
            query: query.to_string(),
        })
}

/// Parse a sample value as encoded by Prometheus (`"1.5"`, `"NaN"`, `"+Inf"`).
pub fn parse_sample_value(raw: &str) -> Result<f64> {
    match raw {
        "NaN" => Ok(f64::NAN),
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => raw.parse().map_err(|_| {
            Error::PrometheusResponseParse(format!("Invalid float value: {:?}", raw))
        }),
    }
}

// =============================================================================
// Wire Types
// =============================================================================

type RawPoint = (f64, String);

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub(crate) enum RawData {
    Scalar(RawPoint),
    String(RawPoint),
    Vector(Vec<RawSample>),
    Matrix(Vec<RawSeries>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: RawPoint,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<RawPoint>,
}

impl TryFrom<RawData> for QueryValue {
    type Error = Error;

    fn try_from(raw: RawData) -> Result<Self> {
        let value = match raw {
            RawData::Scalar((timestamp, value)) => QueryValue::Scalar {
                timestamp,
                value: parse_sample_value(&value)?,
            },
            RawData::String((timestamp, value)) => QueryValue::String { timestamp, value },
            RawData::Vector(samples) => QueryValue::Vector(
                samples
                    .into_iter()
                    .map(|s| -> Result<Sample> {
                        Ok(Sample {
                            metric: s.metric,
                            timestamp: s.value.0,
                            value: parse_sample_value(&s.value.1)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
            RawData::Matrix(series) => QueryValue::Matrix(
                series
                    .into_iter()
                    .map(|s| -> Result<Series> {
                        let values = s
                            .values
                            .iter()
                            .map(|(ts, v)| -> Result<(f64, f64)> {
                                Ok((*ts, parse_sample_value(v)?))
                            })
                            .collect::<Result<_>>()?;
                        Ok(Series {
                            metric: s.metric,
                            values,
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
        };
        Ok(value)
    }
}
