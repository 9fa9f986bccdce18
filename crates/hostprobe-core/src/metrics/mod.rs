//! Metric registry modules.
//!
//! - `descriptor`: immutable metric declarations (name, help, kind, label names).
//! - `registry`: the shared series store guarded by a single registry-wide lock.
//! - `text`: the plain-text exposition encoder used by the scrape endpoint.
//!
//! Writers mutate the registry under its lock; readers take a `snapshot()` and
//! render it without holding the lock, so a slow scraper never stalls a
//! sampling pass.

pub mod descriptor;
pub mod registry;
pub mod text;

pub use descriptor::{MetricDescriptor, MetricKind, DEFAULT_DURATION_BUCKETS};
pub use registry::{
    FamilySnapshot, HistogramState, Registry, RegistrySnapshot, SeriesValue, Transaction,
};
pub use text::{encode_text, TEXT_CONTENT_TYPE};
