//! In-memory collaborators shared by the exporter integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use hostprobe_core::error::{ProbeError, Result};
use hostprobe_exporter::app_state::AppState;
use hostprobe_exporter::config::{self, ExporterConfig};
use hostprobe_exporter::sampler::{
    ContainerSource, FilesystemSource, HostInfo, ProcessInfo, ProcessSource, Sampler, Updater,
};

pub const HOST_MEMORY: u64 = 8 * 1024 * 1024 * 1024;

pub fn proc_info(pid: &str, cpu: f64, mem: f64, command: &str) -> ProcessInfo {
    ProcessInfo {
        pid: pid.to_string(),
        cpu_percent: cpu,
        mem_percent: mem,
        command: command.to_string(),
    }
}

/// Process table keyed by pattern; a missing pattern yields no matches.
#[derive(Default)]
pub struct FakeProcesses {
    table: Mutex<HashMap<String, Vec<ProcessInfo>>>,
    failing: Mutex<Vec<String>>,
}

impl FakeProcesses {
    pub fn put(&self, pattern: &str, procs: Vec<ProcessInfo>) {
        self.table.lock().unwrap().insert(pattern.to_string(), procs);
    }

    pub fn fail(&self, pattern: &str) {
        self.failing.lock().unwrap().push(pattern.to_string());
    }
}

#[async_trait]
impl ProcessSource for FakeProcesses {
    async fn list(&self, pattern: &str) -> Result<Vec<ProcessInfo>> {
        if self.failing.lock().unwrap().iter().any(|p| p == pattern) {
            return Err(ProbeError::collaborator("process", "ps exploded"));
        }
        Ok(self
            .table
            .lock()
            .unwrap()
            .get(pattern)
            .cloned()
            .unwrap_or_default())
    }
}

pub struct FakeContainers(pub Result<u64>);

#[async_trait]
impl ContainerSource for FakeContainers {
    async fn count(&self) -> Result<u64> {
        match &self.0 {
            Ok(n) => Ok(*n),
            Err(e) => Err(ProbeError::collaborator("container", e.to_string())),
        }
    }
}

pub struct FakeFiles(pub u64);

#[async_trait]
impl FilesystemSource for FakeFiles {
    async fn count(&self, _root: &Path, _filename: &str) -> Result<u64> {
        Ok(self.0)
    }
}

/// Never answers; exercises the collaborator timeout.
pub struct HungContainers;

#[async_trait]
impl ContainerSource for HungContainers {
    async fn count(&self) -> Result<u64> {
        std::future::pending().await
    }
}

pub fn test_config() -> ExporterConfig {
    config::load_from_str(&format!(
        r#"
version: 1
sampler:
  interval_ms: 1000
  collector_timeout_ms: 200
  processes: ["npm", "node"]
  host_memory_bytes: {HOST_MEMORY}
"#
    ))
    .unwrap()
}

pub fn host() -> HostInfo {
    HostInfo {
        total_memory_bytes: HOST_MEMORY,
        cores: 4,
    }
}

pub struct Harness {
    pub state: AppState,
    pub processes: Arc<FakeProcesses>,
    pub sampler: Sampler,
    pub updater: Updater,
}

pub fn harness_with(containers: Arc<dyn ContainerSource>) -> Harness {
    let cfg = test_config();
    let state = AppState::new(cfg).unwrap();
    let processes = Arc::new(FakeProcesses::default());
    let sampler = Sampler::new(
        state.cfg().sampler.processes.clone(),
        state.cfg().sampler.collector_timeout(),
        processes.clone(),
    )
    .with_containers(containers)
    .with_markers(Arc::new(FakeFiles(7)), "/host/proc", "package.json");
    let updater = Updater::new(state.registry(), state.families().clone(), host());
    Harness {
        state,
        processes,
        sampler,
        updater,
    }
}

pub fn harness() -> Harness {
    harness_with(Arc::new(FakeContainers(Ok(3))))
}

pub fn gauge(state: &AppState, name: &str, labels: &[&str]) -> Option<f64> {
    state
        .registry()
        .get(name, labels)
        .unwrap()
        .and_then(|v| v.as_f64())
}
