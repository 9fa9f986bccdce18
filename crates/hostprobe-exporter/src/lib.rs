//! hostprobe exporter library entry.
//!
//! This crate wires configuration, the sampling loop, and the HTTP surface
//! around the core registry. It is consumed by the binary (`main.rs`) and by
//! integration tests, which swap the OS-backed collaborators for fakes.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
pub mod sampler;
