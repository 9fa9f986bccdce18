//! Shared application state for the exporter.
//!
//! Owns the one `Registry` instance. The HTTP layer reads it through
//! `AppState`; the sampling loop gets its own `Arc` via `registry()`.

use std::sync::Arc;

use hostprobe_core::error::Result;
use hostprobe_core::metrics::Registry;

use crate::config::ExporterConfig;
use crate::obs::metrics::{self, HostFamilies};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    registry: Arc<Registry>,
}

struct AppStateInner {
    cfg: ExporterConfig,
    families: HostFamilies,
}

impl AppState {
    /// Build the registry and declare every metric family.
    /// Returns Result so main can report a bad family layout instead of panicking.
    pub fn new(cfg: ExporterConfig) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let families = HostFamilies::from_config(&cfg);

        metrics::register_builtin(&registry)?;
        metrics::register_host(&registry, &families)?;

        tracing::debug!(
            patterns = families.processes.len(),
            containers = families.containers.is_some(),
            markers = families.markers.is_some(),
            "metric families registered"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, families }),
            registry,
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.inner.cfg
    }

    pub fn families(&self) -> &HostFamilies {
        &self.inner.families
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Fails when the registry can no longer be locked.
    pub fn health_check(&self) -> Result<()> {
        self.registry
            .series_count(metrics::HTTP_REQUESTS_IN_FLIGHT)
            .map(|_| ())
    }
}
