//! Built-in metric families.
//!
//! Everything the exporter writes is declared here once at start-up. Per-pattern
//! process families are derived from the configured patterns.

use std::time::{SystemTime, UNIX_EPOCH};

use hostprobe_core::error::Result;
use hostprobe_core::metrics::{MetricDescriptor, Registry, DEFAULT_DURATION_BUCKETS};

use crate::config::schema::metric_prefix;
use crate::config::ExporterConfig;
use crate::sampler::host::process_start_time;

pub const HTTP_REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const HTTP_LABELS: [&str; 3] = ["method", "route", "status"];

pub const SCRAPE_ERRORS_TOTAL: &str = "hostprobe_scrape_errors_total";
pub const COLLECTOR_ERRORS_TOTAL: &str = "hostprobe_collector_errors_total";
pub const SAMPLE_DURATION: &str = "hostprobe_sample_duration_seconds";
pub const LAST_SAMPLE_TIMESTAMP: &str = "hostprobe_last_sample_timestamp_seconds";
pub const HOST_MEMORY_BYTES: &str = "hostprobe_host_memory_bytes";

pub const PROCESS_RESIDENT_MEMORY: &str = "process_resident_memory_bytes";
pub const PROCESS_OPEN_FDS: &str = "process_open_fds";
pub const PROCESS_START_TIME: &str = "process_start_time_seconds";
pub const PROCESS_CPU_SECONDS: &str = "process_cpu_seconds_total";

/// Sampling passes are slow (subprocesses, directory walks).
const SAMPLE_BUCKETS: [f64; 8] = [0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 10.0];

/// Families derived from one watched process pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFamilies {
    pub pattern: String,
    pub count: String,
    pub memory: String,
    pub cpu: String,
}

impl ProcessFamilies {
    pub fn for_pattern(pattern: &str) -> Self {
        let prefix = metric_prefix(pattern);
        Self {
            pattern: pattern.to_string(),
            count: format!("{prefix}_process_count"),
            memory: format!("{prefix}_process_memory_bytes"),
            cpu: format!("{prefix}_process_cpu_percent"),
        }
    }
}

/// Names of the host-level families the Updater writes.
#[derive(Debug, Clone)]
pub struct HostFamilies {
    pub processes: Vec<ProcessFamilies>,
    pub containers: Option<String>,
    pub markers: Option<String>,
}

impl HostFamilies {
    pub fn from_config(cfg: &ExporterConfig) -> Self {
        Self {
            processes: cfg
                .sampler
                .processes
                .iter()
                .map(|p| ProcessFamilies::for_pattern(p))
                .collect(),
            containers: cfg.containers.enabled.then(|| cfg.containers.metric.clone()),
            markers: cfg.markers.enabled.then(|| cfg.markers.metric.clone()),
        }
    }
}

/// Declare the HTTP and exporter self-metrics and stamp the start time.
pub fn register_builtin(registry: &Registry) -> Result<()> {
    registry.register(MetricDescriptor::gauge(
        HTTP_REQUESTS_IN_FLIGHT,
        "HTTP requests currently being served",
        &[],
    ))?;
    registry.register(MetricDescriptor::counter(
        HTTP_REQUESTS_TOTAL,
        "Total HTTP requests served",
        &HTTP_LABELS,
    ))?;
    registry.register(MetricDescriptor::histogram(
        HTTP_REQUEST_DURATION,
        "HTTP request duration in seconds",
        &HTTP_LABELS,
        &DEFAULT_DURATION_BUCKETS,
    ))?;
    registry.register(MetricDescriptor::counter(
        SCRAPE_ERRORS_TOTAL,
        "Scrapes that failed to render the registry",
        &[],
    ))?;
    registry.register(MetricDescriptor::counter(
        COLLECTOR_ERRORS_TOTAL,
        "Failed collaborator invocations during sampling",
        &["collector"],
    ))?;
    registry.register(MetricDescriptor::histogram(
        SAMPLE_DURATION,
        "Duration of a full sampling pass in seconds",
        &[],
        &SAMPLE_BUCKETS,
    ))?;
    registry.register(MetricDescriptor::gauge(
        LAST_SAMPLE_TIMESTAMP,
        "Unix time of the last completed sampling pass",
        &[],
    ))?;
    registry.register(MetricDescriptor::gauge(
        HOST_MEMORY_BYTES,
        "Total host memory used to convert memory percentages to bytes",
        &[],
    ))?;
    registry.register(MetricDescriptor::gauge(
        PROCESS_RESIDENT_MEMORY,
        "Resident memory size of the exporter in bytes",
        &[],
    ))?;
    registry.register(MetricDescriptor::gauge(
        PROCESS_OPEN_FDS,
        "Number of open file descriptors of the exporter",
        &[],
    ))?;
    registry.register(MetricDescriptor::gauge(
        PROCESS_START_TIME,
        "Start time of the exporter since unix epoch in seconds",
        &[],
    ))?;
    registry.register(MetricDescriptor::counter(
        PROCESS_CPU_SECONDS,
        "Total user and system CPU time spent by the exporter in seconds",
        &[],
    ))?;

    let started = process_start_time().unwrap_or_else(|| {
        tracing::debug!("process start time unavailable; using registration time");
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    });
    registry.set(PROCESS_START_TIME, &[], started)?;
    Ok(())
}

/// Declare the families fed by the Sampler.
pub fn register_host(registry: &Registry, families: &HostFamilies) -> Result<()> {
    for p in &families.processes {
        registry.register(MetricDescriptor::gauge(
            &p.count,
            format!("Number of running {} processes", p.pattern),
            &[],
        ))?;
        registry.register(MetricDescriptor::gauge(
            &p.memory,
            format!("Memory usage of {} processes in bytes", p.pattern),
            &["pid", "command"],
        ))?;
        registry.register(MetricDescriptor::gauge(
            &p.cpu,
            format!("CPU usage percentage of {} processes", p.pattern),
            &["pid", "command"],
        ))?;
    }
    if let Some(name) = &families.containers {
        registry.register(MetricDescriptor::gauge(
            name,
            "Number of running containers",
            &[],
        ))?;
    }
    if let Some(name) = &families.markers {
        registry.register(MetricDescriptor::gauge(
            name,
            "Number of marker files found under the configured root",
            &[],
        ))?;
    }
    Ok(())
}
