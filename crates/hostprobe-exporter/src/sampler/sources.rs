//! Collaborator interfaces and their OS-backed implementations.
//!
//! Production sources shell out (`ps`, the container runtime CLI) or walk the
//! filesystem. Child processes are spawned with `kill_on_drop`, so the
//! Sampler's timeout also reaps a hung command.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use walkdir::WalkDir;

use hostprobe_core::error::{ProbeError, Result};

use super::{ProcessInfo, CONTAINER_COLLECTOR, FILESYSTEM_COLLECTOR, PROCESS_COLLECTOR};

/// Lists running processes whose command line matches a pattern.
#[async_trait]
pub trait ProcessSource: Send + Sync {
    /// Zero matches is `Ok(vec![])`, not an error.
    async fn list(&self, pattern: &str) -> Result<Vec<ProcessInfo>>;
}

/// Counts running containers.
#[async_trait]
pub trait ContainerSource: Send + Sync {
    async fn count(&self) -> Result<u64>;
}

/// Counts files named `filename` below `root`.
#[async_trait]
pub trait FilesystemSource: Send + Sync {
    /// An inaccessible root counts as 0.
    async fn count(&self, root: &Path, filename: &str) -> Result<u64>;
}

async fn run_command(collector: &'static str, program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ProbeError::collaborator(collector, format!("spawn {program}: {e}")))?;

    if !output.status.success() {
        return Err(ProbeError::collaborator(
            collector,
            format!("{program} exited with {}", output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `ps -eo pid=,pcpu=,pmem=,args=` output.
///
/// Any non-blank line that does not parse fails the whole listing.
pub fn parse_ps_output(out: &str) -> Result<Vec<ProcessInfo>> {
    let malformed =
        |line: &str| ProbeError::collaborator(PROCESS_COLLECTOR, format!("malformed ps line: {line:?}"));

    let mut procs = Vec::new();
    for line in out.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let pid = fields.next().ok_or_else(|| malformed(line))?;
        if pid.parse::<u32>().is_err() {
            return Err(malformed(line));
        }
        let cpu_percent = fields
            .next()
            .and_then(|f| f.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or_else(|| malformed(line))?;
        let mem_percent = fields
            .next()
            .and_then(|f| f.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or_else(|| malformed(line))?;
        let command = fields.collect::<Vec<_>>().join(" ");

        procs.push(ProcessInfo {
            pid: pid.to_string(),
            cpu_percent,
            mem_percent,
            command,
        });
    }
    Ok(procs)
}

/// Process table via `ps`. Matches the pattern as a substring of the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct PsProcessSource;

#[async_trait]
impl ProcessSource for PsProcessSource {
    async fn list(&self, pattern: &str) -> Result<Vec<ProcessInfo>> {
        let out = run_command(
            PROCESS_COLLECTOR,
            "ps",
            &["-eo", "pid=,pcpu=,pmem=,args="],
        )
        .await?;
        let own_pid = std::process::id().to_string();
        Ok(parse_ps_output(&out)?
            .into_iter()
            .filter(|p| p.pid != own_pid && p.command.contains(pattern))
            .collect())
    }
}

/// Running containers via `<runtime> ps -q`.
#[derive(Debug, Clone)]
pub struct CliContainerSource {
    runtime: String,
}

impl CliContainerSource {
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
        }
    }
}

#[async_trait]
impl ContainerSource for CliContainerSource {
    async fn count(&self) -> Result<u64> {
        let out = run_command(CONTAINER_COLLECTOR, &self.runtime, &["ps", "-q"]).await?;
        Ok(out.lines().filter(|l| !l.trim().is_empty()).count() as u64)
    }
}

/// Recursive file count on a blocking thread.
///
/// The walk stops once `budget` is spent so an abandoned walk does not keep a
/// blocking thread busy after the Sampler has timed it out.
#[derive(Debug, Clone)]
pub struct WalkdirFilesystemSource {
    max_depth: Option<usize>,
    budget: Duration,
}

impl WalkdirFilesystemSource {
    pub fn new(max_depth: Option<usize>, budget: Duration) -> Self {
        Self { max_depth, budget }
    }
}

fn count_files(root: &Path, filename: &str, max_depth: Option<usize>, budget: Duration) -> Result<u64> {
    if std::fs::metadata(root).is_err() {
        tracing::debug!(root = %root.display(), "marker root inaccessible; counting 0");
        return Ok(0);
    }

    let deadline = Instant::now() + budget;
    let mut walker = WalkDir::new(root).follow_links(false);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    let mut count = 0u64;
    // Unreadable subtrees (permission denied, vanished pids) are skipped.
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if Instant::now() > deadline {
            return Err(ProbeError::collaborator(
                FILESYSTEM_COLLECTOR,
                format!("walk of {} exceeded {budget:?}", root.display()),
            ));
        }
        if !entry.file_type().is_dir() && entry.file_name() == OsStr::new(filename) {
            count += 1;
        }
    }
    Ok(count)
}

#[async_trait]
impl FilesystemSource for WalkdirFilesystemSource {
    async fn count(&self, root: &Path, filename: &str) -> Result<u64> {
        let root: PathBuf = root.to_path_buf();
        let filename = filename.to_string();
        let max_depth = self.max_depth;
        let budget = self.budget;
        tokio::task::spawn_blocking(move || count_files(&root, &filename, max_depth, budget))
            .await
            .map_err(|e| ProbeError::collaborator(FILESYSTEM_COLLECTOR, format!("walk task: {e}")))?
    }
}
