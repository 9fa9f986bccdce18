use std::time::Duration;

use serde::Deserialize;

use hostprobe_core::error::{ProbeError, Result};
use hostprobe_core::metrics::descriptor::is_valid_metric_name;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub sampler: SamplerSection,

    #[serde(default)]
    pub containers: ContainerSection,

    #[serde(default)]
    pub markers: MarkerSection,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            sampler: SamplerSection::default(),
            containers: ContainerSection::default(),
            markers: MarkerSection::default(),
        }
    }
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ProbeError::BadConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.sampler.validate()?;

        if self.containers.enabled {
            check_metric_name("containers.metric", &self.containers.metric)?;
            if self.containers.runtime.trim().is_empty() {
                return Err(ProbeError::BadConfig(
                    "containers.runtime must not be empty".into(),
                ));
            }
        }
        if self.markers.enabled {
            check_metric_name("markers.metric", &self.markers.metric)?;
            if self.markers.filename.is_empty() || self.markers.filename.contains('/') {
                return Err(ProbeError::BadConfig(
                    "markers.filename must be a plain file name".into(),
                ));
            }
        }

        Ok(())
    }
}

fn check_metric_name(field: &str, name: &str) -> Result<()> {
    if is_valid_metric_name(name) {
        Ok(())
    } else {
        Err(ProbeError::BadConfig(format!(
            "{field} is not a valid metric name: {name:?}"
        )))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ProbeError::BadConfig("server.port must not be 0".into()));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    9101
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerSection {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_collector_timeout_ms")]
    pub collector_timeout_ms: u64,

    /// Process name patterns; each yields `<prefix>_process_*` metrics.
    #[serde(default = "default_processes")]
    pub processes: Vec<String>,

    /// Overrides the total memory read from the host.
    #[serde(default)]
    pub host_memory_bytes: Option<u64>,
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            collector_timeout_ms: default_collector_timeout_ms(),
            processes: default_processes(),
            host_memory_bytes: None,
        }
    }
}

impl SamplerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=3_600_000).contains(&self.interval_ms) {
            return Err(ProbeError::BadConfig(
                "sampler.interval_ms must be between 1000 and 3600000".into(),
            ));
        }
        if self.collector_timeout_ms < 100 || self.collector_timeout_ms > self.interval_ms {
            return Err(ProbeError::BadConfig(
                "sampler.collector_timeout_ms must be at least 100 and at most interval_ms".into(),
            ));
        }
        if self.processes.is_empty() {
            return Err(ProbeError::BadConfig(
                "sampler.processes must not be empty".into(),
            ));
        }
        if self.host_memory_bytes == Some(0) {
            return Err(ProbeError::BadConfig(
                "sampler.host_memory_bytes must be positive".into(),
            ));
        }

        let mut seen = Vec::with_capacity(self.processes.len());
        for pattern in &self.processes {
            if pattern.trim().is_empty() {
                return Err(ProbeError::BadConfig(
                    "sampler.processes entries must not be blank".into(),
                ));
            }
            let prefix = metric_prefix(pattern);
            check_metric_name("sampler.processes", &format!("{prefix}_process_count"))?;
            if seen.contains(&prefix) {
                return Err(ProbeError::BadConfig(format!(
                    "sampler.processes: {pattern:?} collides with another pattern (prefix {prefix})"
                )));
            }
            seen.push(prefix);
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn collector_timeout(&self) -> Duration {
        Duration::from_millis(self.collector_timeout_ms)
    }
}

/// Metric name prefix for a process pattern: lowercase, non-alphanumerics as `_`.
pub fn metric_prefix(pattern: &str) -> String {
    pattern
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn default_interval_ms() -> u64 {
    10_000
}
fn default_collector_timeout_ms() -> u64 {
    5_000
}
fn default_processes() -> Vec<String> {
    vec!["npm".into(), "node".into()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Container runtime CLI (`docker`, `podman`, ...).
    #[serde(default = "default_runtime")]
    pub runtime: String,

    #[serde(default = "default_container_metric")]
    pub metric: String,
}

impl Default for ContainerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            runtime: default_runtime(),
            metric: default_container_metric(),
        }
    }
}

fn default_runtime() -> String {
    "docker".into()
}
fn default_container_metric() -> String {
    "docker_container_count".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_marker_root")]
    pub root: String,

    #[serde(default = "default_marker_filename")]
    pub filename: String,

    #[serde(default = "default_marker_metric")]
    pub metric: String,

    /// Walk depth limit below `root`; unlimited when absent.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

impl Default for MarkerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            root: default_marker_root(),
            filename: default_marker_filename(),
            metric: default_marker_metric(),
            max_depth: None,
        }
    }
}

fn default_marker_root() -> String {
    "/host/proc".into()
}
fn default_marker_filename() -> String {
    "package.json".into()
}
fn default_marker_metric() -> String {
    "npm_package_json_count".into()
}

fn default_true() -> bool {
    true
}
