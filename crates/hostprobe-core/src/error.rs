//! Shared error type across hostprobe crates.

use thiserror::Error;

/// Stable error codes (used in logs and by tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Metric name was never registered.
    UnknownMetric,
    /// Metric name registered twice.
    DuplicateMetric,
    /// Label value count differs from the descriptor's label names.
    LabelArityMismatch,
    /// Counter increment with a negative or non-finite delta.
    InvalidDelta,
    /// Non-finite histogram observation.
    InvalidValue,
    /// Operation does not apply to the metric's kind.
    KindMismatch,
    /// Malformed metric or label name, or bad histogram buckets.
    InvalidDescriptor,
    /// External collaborator failed or returned unparseable output.
    CollaboratorFailure,
    /// Registry state could not be rendered.
    SerializationFailure,
    /// Invalid configuration.
    BadConfig,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnknownMetric => "UNKNOWN_METRIC",
            ErrorCode::DuplicateMetric => "DUPLICATE_METRIC",
            ErrorCode::LabelArityMismatch => "LABEL_ARITY_MISMATCH",
            ErrorCode::InvalidDelta => "INVALID_DELTA",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::KindMismatch => "KIND_MISMATCH",
            ErrorCode::InvalidDescriptor => "INVALID_DESCRIPTOR",
            ErrorCode::CollaboratorFailure => "COLLABORATOR_FAILURE",
            ErrorCode::SerializationFailure => "SERIALIZATION_FAILURE",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Unified error type used by core and exporter.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
    #[error("duplicate metric: {0}")]
    DuplicateMetric(String),
    #[error("label arity mismatch for {metric}: expected {expected}, got {got}")]
    LabelArityMismatch {
        metric: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid delta for {metric}: {delta}")]
    InvalidDelta { metric: String, delta: f64 },
    #[error("invalid value for {metric}: {value}")]
    InvalidValue { metric: String, value: f64 },
    #[error("{metric} is a {actual}, not a {expected}")]
    KindMismatch {
        metric: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("collaborator {collector} failed: {msg}")]
    Collaborator { collector: &'static str, msg: String },
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ProbeError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ProbeError::UnknownMetric(_) => ErrorCode::UnknownMetric,
            ProbeError::DuplicateMetric(_) => ErrorCode::DuplicateMetric,
            ProbeError::LabelArityMismatch { .. } => ErrorCode::LabelArityMismatch,
            ProbeError::InvalidDelta { .. } => ErrorCode::InvalidDelta,
            ProbeError::InvalidValue { .. } => ErrorCode::InvalidValue,
            ProbeError::KindMismatch { .. } => ErrorCode::KindMismatch,
            ProbeError::InvalidDescriptor(_) => ErrorCode::InvalidDescriptor,
            ProbeError::Collaborator { .. } => ErrorCode::CollaboratorFailure,
            ProbeError::Serialization(_) => ErrorCode::SerializationFailure,
            ProbeError::BadConfig(_) => ErrorCode::BadConfig,
            ProbeError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Shorthand for a collaborator failure.
    pub fn collaborator(collector: &'static str, msg: impl Into<String>) -> Self {
        ProbeError::Collaborator {
            collector,
            msg: msg.into(),
        }
    }
}
