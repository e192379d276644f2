//! PromQL expression builder
//!
//! All caller-supplied identifiers reach a query through [`Selector`], which
//! escapes them for PromQL string literals (and for RE2 when they are joined
//! into a regex union). [`check_identifier`] rejects values that have no
//! business being a node id, instance or service name.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Label matching operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Equal,
    NotEqual,
    RegexMatch,
}

impl MatchOp {
    fn as_str(self) -> &'static str {
        match self {
            MatchOp::Equal => "=",
            MatchOp::NotEqual => "!=",
            MatchOp::RegexMatch => "=~",
        }
    }
}

/// A single `label<op>"value"` matcher; `value` is stored already escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Matcher {
    label: String,
    op: MatchOp,
    value: String,
}

/// Instant vector selector: `metric{label="value",...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    metric: String,
    matchers: Vec<Matcher>,
}

impl Selector {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            matchers: Vec::new(),
        }
    }

    /// `label="value"`
    pub fn eq(self, label: &str, value: &str) -> Self {
        self.push(label, MatchOp::Equal, escape_string(value))
    }

    /// `label!="value"`
    pub fn ne(self, label: &str, value: &str) -> Self {
        self.push(label, MatchOp::NotEqual, escape_string(value))
    }

    /// `label=~"v1|v2|..."`, each value matched literally.
    pub fn any_of<S: AsRef<str>>(self, label: &str, values: &[S]) -> Self {
        let union = values
            .iter()
            .map(|v| escape_regex(v.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        self.push(label, MatchOp::RegexMatch, escape_string(&union))
    }

    fn push(mut self, label: &str, op: MatchOp, value: String) -> Self {
        self.matchers.push(Matcher {
            label: label.to_string(),
            op,
            value,
        });
        self
    }

    /// Range vector selector over `window`.
    pub fn range(&self, window: Duration) -> String {
        format!("{}[{}]", self, format_duration(window))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.metric)?;
        if self.matchers.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, m) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}{}\"{}\"", m.label, m.op.as_str(), m.value)?;
        }
        f.write_str("}")
    }
}

// =============================================================================
// Aggregations and functions
// =============================================================================

pub fn sum(expr: impl fmt::Display) -> String {
    format!("sum({})", expr)
}

pub fn avg(expr: impl fmt::Display) -> String {
    format!("avg({})", expr)
}

/// `count(expr) by (label)`
pub fn count_by(expr: impl fmt::Display, label: &str) -> String {
    format!("count({}) by ({})", expr, label)
}

pub fn count(expr: impl fmt::Display) -> String {
    format!("count({})", expr)
}

pub fn rate(selector: &Selector, window: Duration) -> String {
    format!("rate({})", selector.range(window))
}

pub fn irate(selector: &Selector, window: Duration) -> String {
    format!("irate({})", selector.range(window))
}

/// PromQL duration literal: whole minutes as `5m`, otherwise seconds.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", d.as_millis())
    }
}

// =============================================================================
// Escaping
// =============================================================================

/// Reject identifiers that are empty or carry control characters.
pub fn check_identifier(label: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidLabelValue {
            label: label.to_string(),
            reason: "value is empty".to_string(),
        });
    }
    if let Some(c) = value.chars().find(|c| c.is_control()) {
        return Err(Error::InvalidLabelValue {
            label: label.to_string(),
            reason: format!("contains control character {:?}", c),
        });
    }
    Ok(())
}

/// Escape a value for a double-quoted PromQL string literal.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Escape RE2 metacharacters so `value` matches literally.
pub fn escape_regex(value: &str) -> String {
    const META: &[char] = &[
        '\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$',
    ];
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
