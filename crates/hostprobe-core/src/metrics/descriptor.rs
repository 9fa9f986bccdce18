//! Metric declarations.
//!
//! A descriptor is validated once at registration and never changes afterwards.
//! Names follow the exposition grammar (`[a-zA-Z_:][a-zA-Z0-9_:]*`), label names
//! the stricter `[a-zA-Z_][a-zA-Z0-9_]*` without the reserved `__` prefix.

use crate::error::{ProbeError, Result};

/// Request latency buckets in seconds.
pub const DEFAULT_DURATION_BUCKETS: [f64; 11] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Kind of a metric family.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    Counter,
    Gauge,
    /// Finite, strictly increasing upper bounds. `+Inf` is implicit.
    Histogram { buckets: Vec<f64> },
}

impl MetricKind {
    /// Name used on the `# TYPE` line.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram { .. } => "histogram",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
}

impl MetricDescriptor {
    pub fn counter(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Self {
        Self::new(name, help, MetricKind::Counter, labels)
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Self {
        Self::new(name, help, MetricKind::Gauge, labels)
    }

    pub fn histogram(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: &[&str],
        buckets: &[f64],
    ) -> Self {
        Self::new(
            name,
            help,
            MetricKind::Histogram {
                buckets: buckets.to_vec(),
            },
            labels,
        )
    }

    fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        kind: MetricKind,
        labels: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            label_names: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Check names and bucket layout. Called by `Registry::register`.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_metric_name(&self.name) {
            return Err(ProbeError::InvalidDescriptor(format!(
                "invalid metric name: {:?}",
                self.name
            )));
        }

        for (i, label) in self.label_names.iter().enumerate() {
            if !is_valid_label_name(label) {
                return Err(ProbeError::InvalidDescriptor(format!(
                    "{}: invalid label name {:?}",
                    self.name, label
                )));
            }
            if self.label_names[..i].contains(label) {
                return Err(ProbeError::InvalidDescriptor(format!(
                    "{}: duplicate label name {:?}",
                    self.name, label
                )));
            }
        }

        if let MetricKind::Histogram { buckets } = &self.kind {
            if self.label_names.iter().any(|l| l == "le") {
                return Err(ProbeError::InvalidDescriptor(format!(
                    "{}: histogram may not use the \"le\" label",
                    self.name
                )));
            }
            if buckets.is_empty() {
                return Err(ProbeError::InvalidDescriptor(format!(
                    "{}: histogram needs at least one bucket",
                    self.name
                )));
            }
            if buckets.iter().any(|b| !b.is_finite()) || buckets.windows(2).any(|w| w[0] >= w[1])
            {
                return Err(ProbeError::InvalidDescriptor(format!(
                    "{}: buckets must be finite and strictly increasing",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, `__` prefix reserved.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
