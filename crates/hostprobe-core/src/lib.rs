//! hostprobe core: the typed metric registry, its error surface, and the text
//! exposition encoder.
//!
//! This crate carries no runtime, HTTP, or OS dependencies so the registry can be
//! exercised in isolation with fake collaborators.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Contract violations surface as `ProbeError`/`Result` so a misbehaving caller
//! cannot crash the exporter.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metrics;

/// Shared result type.
pub use error::{ErrorCode, ProbeError, Result};
pub use metrics::{
    encode_text, MetricDescriptor, MetricKind, Registry, RegistrySnapshot, SeriesValue,
    TEXT_CONTENT_TYPE,
};
