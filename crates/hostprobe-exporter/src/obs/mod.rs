//! Exporter self-observability.
//!
//! - `metrics`: names and registration of every built-in metric family.
//! - `http`: request instrumentation middleware feeding the same registry.

pub mod http;
pub mod metrics;
