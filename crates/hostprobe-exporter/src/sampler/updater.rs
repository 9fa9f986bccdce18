//! Translate a `Sample` into registry mutations.
//!
//! The whole pass is written inside one registry transaction, so a scrape sees
//! either the previous pass or this one, never a mix. Per-process gauges are
//! replaced wholesale: a `(pid, command)` key missing from this pass is dropped
//! instead of reporting the last value of a process that has exited.

use std::sync::Arc;

use hostprobe_core::error::Result;
use hostprobe_core::metrics::{Registry, Transaction};

use crate::obs::metrics::{
    HostFamilies, ProcessFamilies, COLLECTOR_ERRORS_TOTAL, HOST_MEMORY_BYTES,
    LAST_SAMPLE_TIMESTAMP, PROCESS_CPU_SECONDS, PROCESS_OPEN_FDS, PROCESS_RESIDENT_MEMORY,
    SAMPLE_DURATION,
};

use super::{HostInfo, ProcessInfo, Sample, SelfStats};

pub struct Updater {
    registry: Arc<Registry>,
    families: HostFamilies,
    host: HostInfo,
    last_cpu_seconds: f64,
}

impl Updater {
    pub fn new(registry: Arc<Registry>, families: HostFamilies, host: HostInfo) -> Self {
        Self {
            registry,
            families,
            host,
            last_cpu_seconds: 0.0,
        }
    }

    /// Write one pass. Contract errors on individual families are logged and
    /// skipped so one pattern cannot block the others.
    pub fn apply(&mut self, sample: &Sample) -> Result<()> {
        let cpu_delta = sample
            .self_stats
            .and_then(|s| s.cpu_seconds)
            .map(|now| {
                let delta = (now - self.last_cpu_seconds).max(0.0);
                self.last_cpu_seconds = now.max(self.last_cpu_seconds);
                delta
            });

        let families = &self.families;
        let host = self.host;
        self.registry.transaction(|tx| {
            for family in &families.processes {
                let procs = sample.processes_for(&family.pattern);
                if let Err(e) = write_processes(tx, family, procs, host) {
                    tracing::warn!(pattern = %family.pattern, error = %e, "process metrics not updated");
                }
            }

            if let Some(name) = &families.containers {
                log_failure(tx.set(name, &[], sample.containers as f64), name);
            }
            if let Some(name) = &families.markers {
                log_failure(tx.set(name, &[], sample.marker_files as f64), name);
            }

            for collector in &sample.failures {
                log_failure(
                    tx.increment(COLLECTOR_ERRORS_TOTAL, &[*collector], 1.0),
                    COLLECTOR_ERRORS_TOTAL,
                );
            }

            if let Some(stats) = sample.self_stats {
                write_self_stats(tx, stats, cpu_delta);
            }

            log_failure(
                tx.set(HOST_MEMORY_BYTES, &[], host.total_memory_bytes as f64),
                HOST_MEMORY_BYTES,
            );
            log_failure(
                tx.observe(SAMPLE_DURATION, &[], sample.duration.as_secs_f64()),
                SAMPLE_DURATION,
            );
            log_failure(
                tx.set(LAST_SAMPLE_TIMESTAMP, &[], sample.finished_at_unix),
                LAST_SAMPLE_TIMESTAMP,
            );
            Ok(())
        })?;

        tracing::debug!(
            patterns = self.families.processes.len(),
            containers = sample.containers,
            marker_files = sample.marker_files,
            failures = sample.failures.len(),
            elapsed_ms = sample.duration.as_millis() as u64,
            "sampling pass applied"
        );
        Ok(())
    }
}

fn log_failure(res: Result<()>, metric: &str) {
    if let Err(e) = res {
        tracing::warn!(metric = %metric, error = %e, code = e.code().as_str(), "metric not updated");
    }
}

fn write_processes(
    tx: &mut Transaction<'_>,
    family: &ProcessFamilies,
    procs: &[ProcessInfo],
    host: HostInfo,
) -> Result<()> {
    let total_memory = host.total_memory_bytes as f64;
    let max_cpu = host.cores.max(1) as f64 * 100.0;
    let key = |p: &ProcessInfo| vec![p.pid.clone(), p.command.clone()];

    tx.set(&family.count, &[], procs.len() as f64)?;
    tx.replace_gauges(
        &family.memory,
        procs
            .iter()
            .map(|p| (key(p), p.mem_percent.clamp(0.0, 100.0) * total_memory / 100.0)),
    )?;
    tx.replace_gauges(
        &family.cpu,
        procs
            .iter()
            .map(|p| (key(p), p.cpu_percent.clamp(0.0, max_cpu))),
    )?;
    Ok(())
}

fn write_self_stats(tx: &mut Transaction<'_>, stats: SelfStats, cpu_delta: Option<f64>) {
    if let Some(rss) = stats.resident_bytes {
        log_failure(
            tx.set(PROCESS_RESIDENT_MEMORY, &[], rss as f64),
            PROCESS_RESIDENT_MEMORY,
        );
    }
    if let Some(fds) = stats.open_fds {
        log_failure(tx.set(PROCESS_OPEN_FDS, &[], fds as f64), PROCESS_OPEN_FDS);
    }
    if let Some(delta) = cpu_delta {
        log_failure(
            tx.increment(PROCESS_CPU_SECONDS, &[], delta),
            PROCESS_CPU_SECONDS,
        );
    }
}
