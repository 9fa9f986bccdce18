//! Top-level facade crate for hostprobe.
//!
//! Re-exports the metrics core and the exporter library so users can depend on a single crate.

pub mod core {
    pub use hostprobe_core::*;
}

pub mod exporter {
    pub use hostprobe_exporter::*;
}
