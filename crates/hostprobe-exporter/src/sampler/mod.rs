//! Sampling: collaborators, the Sampler that queries them, the Updater that
//! writes a `Sample` into the registry, and the scheduler loop driving both.
//!
//! Collaborators are traits so tests can drive a pass with in-memory fakes.
//! Each collaborator call is bounded by the configured timeout and isolated:
//! a failure degrades only its own metrics to empty/zero for that pass.

pub mod host;
pub mod scheduler;
pub mod sources;
pub mod updater;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use hostprobe_core::error::{ProbeError, Result};

use crate::config::ExporterConfig;

pub use host::{HostInfo, SelfStats};
pub use scheduler::{IntervalTrigger, Trigger};
pub use sources::{
    CliContainerSource, ContainerSource, FilesystemSource, ProcessSource, PsProcessSource,
    WalkdirFilesystemSource,
};
pub use updater::Updater;

pub const PROCESS_COLLECTOR: &str = "process";
pub const CONTAINER_COLLECTOR: &str = "container";
pub const FILESYSTEM_COLLECTOR: &str = "filesystem";

/// One row of the process table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
    pub pid: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub command: String,
}

/// Raw facts gathered in one pass.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    /// `(pattern, matches)` in configured pattern order.
    pub processes: Vec<(String, Vec<ProcessInfo>)>,
    pub containers: u64,
    pub marker_files: u64,
    /// Collectors that failed this pass; one entry per failed call.
    pub failures: Vec<&'static str>,
    pub self_stats: Option<SelfStats>,
    pub duration: Duration,
    pub finished_at_unix: f64,
}

impl Sample {
    pub fn processes_for(&self, pattern: &str) -> &[ProcessInfo] {
        self.processes
            .iter()
            .find(|(p, _)| p == pattern)
            .map(|(_, procs)| procs.as_slice())
            .unwrap_or(&[])
    }
}

struct MarkerTarget {
    source: Arc<dyn FilesystemSource>,
    root: PathBuf,
    filename: String,
}

/// Queries every collaborator once per pass.
pub struct Sampler {
    patterns: Vec<String>,
    timeout: Duration,
    processes: Arc<dyn ProcessSource>,
    containers: Option<Arc<dyn ContainerSource>>,
    markers: Option<MarkerTarget>,
    self_stats: bool,
}

impl Sampler {
    pub fn new(patterns: Vec<String>, timeout: Duration, processes: Arc<dyn ProcessSource>) -> Self {
        Self {
            patterns,
            timeout,
            processes,
            containers: None,
            markers: None,
            self_stats: false,
        }
    }

    pub fn with_containers(mut self, source: Arc<dyn ContainerSource>) -> Self {
        self.containers = Some(source);
        self
    }

    pub fn with_markers(
        mut self,
        source: Arc<dyn FilesystemSource>,
        root: impl Into<PathBuf>,
        filename: impl Into<String>,
    ) -> Self {
        self.markers = Some(MarkerTarget {
            source,
            root: root.into(),
            filename: filename.into(),
        });
        self
    }

    /// Also read the exporter's own `/proc/self` figures each pass.
    pub fn with_self_stats(mut self) -> Self {
        self.self_stats = true;
        self
    }

    /// OS-backed collaborators as configured.
    pub fn from_config(cfg: &ExporterConfig) -> Self {
        let timeout = cfg.sampler.collector_timeout();
        let mut sampler = Sampler::new(
            cfg.sampler.processes.clone(),
            timeout,
            Arc::new(PsProcessSource),
        )
        .with_self_stats();

        if cfg.containers.enabled {
            sampler = sampler.with_containers(Arc::new(CliContainerSource::new(
                cfg.containers.runtime.clone(),
            )));
        }
        if cfg.markers.enabled {
            sampler = sampler.with_markers(
                Arc::new(WalkdirFilesystemSource::new(cfg.markers.max_depth, timeout)),
                cfg.markers.root.clone(),
                cfg.markers.filename.clone(),
            );
        }
        sampler
    }

    async fn bounded<T>(
        &self,
        collector: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(ProbeError::collaborator(
                collector,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    async fn sample_processes(&self) -> (Vec<(String, Vec<ProcessInfo>)>, usize) {
        let mut out = Vec::with_capacity(self.patterns.len());
        let mut failed = 0;
        for pattern in &self.patterns {
            let procs = match self
                .bounded(PROCESS_COLLECTOR, self.processes.list(pattern))
                .await
            {
                Ok(procs) => procs,
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "process listing failed");
                    failed += 1;
                    Vec::new()
                }
            };
            out.push((pattern.clone(), procs));
        }
        (out, failed)
    }

    async fn sample_containers(&self) -> Option<Result<u64>> {
        let source = self.containers.as_ref()?;
        Some(self.bounded(CONTAINER_COLLECTOR, source.count()).await)
    }

    async fn sample_markers(&self) -> Option<Result<u64>> {
        let target = self.markers.as_ref()?;
        Some(
            self.bounded(
                FILESYSTEM_COLLECTOR,
                target.source.count(&target.root, &target.filename),
            )
            .await,
        )
    }

    /// Run one pass. Never fails: collaborator errors become empty/zero values.
    pub async fn sample(&self) -> Sample {
        let started = Instant::now();
        let ((processes, process_failures), containers, markers) = tokio::join!(
            self.sample_processes(),
            self.sample_containers(),
            self.sample_markers(),
        );

        let mut failures = vec![PROCESS_COLLECTOR; process_failures];
        let containers = match containers {
            Some(Ok(n)) => n,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "container count failed");
                failures.push(CONTAINER_COLLECTOR);
                0
            }
            None => 0,
        };
        let marker_files = match markers {
            Some(Ok(n)) => n,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "marker file count failed");
                failures.push(FILESYSTEM_COLLECTOR);
                0
            }
            None => 0,
        };

        let self_stats = self.self_stats.then(host::read_self_stats);

        let finished_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Sample {
            processes,
            containers,
            marker_files,
            failures,
            self_stats,
            duration: started.elapsed(),
            finished_at_unix,
        }
    }
}
