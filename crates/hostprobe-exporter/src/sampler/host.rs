//! Host facts and the exporter's own process figures, read from `/proc`.

use std::fs;

use hostprobe_core::error::{ProbeError, Result};

/// Kernel clock ticks per second as exposed in `/proc/<pid>/stat` (USER_HZ).
const USER_HZ: f64 = 100.0;

/// Static host facts used to scale process readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostInfo {
    pub total_memory_bytes: u64,
    pub cores: usize,
}

impl HostInfo {
    /// `override_bytes` wins over `/proc/meminfo`; failing both is an error.
    pub fn detect(override_bytes: Option<u64>) -> Result<Self> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let total_memory_bytes = match override_bytes {
            Some(bytes) => bytes,
            None => {
                let meminfo = fs::read_to_string("/proc/meminfo").map_err(|e| {
                    ProbeError::collaborator(
                        "host",
                        format!("read /proc/meminfo: {e} (set sampler.host_memory_bytes)"),
                    )
                })?;
                parse_mem_total(&meminfo).ok_or_else(|| {
                    ProbeError::collaborator("host", "MemTotal missing from /proc/meminfo")
                })?
            }
        };

        Ok(Self {
            total_memory_bytes,
            cores,
        })
    }
}

/// `MemTotal:  16303348 kB` -> bytes.
pub fn parse_mem_total(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|l| l.strip_prefix("MemTotal:"))
        .and_then(parse_kb)
}

fn parse_kb(rest: &str) -> Option<u64> {
    let mut parts = rest.split_whitespace();
    let value: u64 = parts.next()?.parse().ok()?;
    match parts.next() {
        Some("kB") | None => value.checked_mul(1024),
        Some(_) => None,
    }
}

/// The exporter's own resource usage. Fields are `None` when unreadable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SelfStats {
    pub resident_bytes: Option<u64>,
    pub open_fds: Option<u64>,
    pub cpu_seconds: Option<f64>,
}

pub fn read_self_stats() -> SelfStats {
    let resident_bytes = fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|s| parse_vm_rss(&s));
    let open_fds = fs::read_dir("/proc/self/fd")
        .ok()
        .map(|dir| dir.count() as u64);
    let cpu_seconds = fs::read_to_string("/proc/self/stat")
        .ok()
        .and_then(|s| parse_cpu_seconds(&s));
    SelfStats {
        resident_bytes,
        open_fds,
        cpu_seconds,
    }
}

/// `VmRSS:     4321 kB` from `/proc/<pid>/status`.
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|l| l.strip_prefix("VmRSS:"))
        .and_then(parse_kb)
}

/// Fields of `/proc/<pid>/stat` from field 3 (state) on.
///
/// The command name may contain spaces and parentheses, so fields are counted
/// from the last `)`.
fn stat_fields(stat: &str) -> Option<Vec<&str>> {
    let rest = &stat[stat.rfind(')')? + 1..];
    Some(rest.split_whitespace().collect())
}

/// utime + stime from `/proc/<pid>/stat`, in seconds.
pub fn parse_cpu_seconds(stat: &str) -> Option<f64> {
    let fields = stat_fields(stat)?;
    // utime is field 14, stime field 15.
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some((utime + stime) as f64 / USER_HZ)
}

/// starttime (field 22) from `/proc/<pid>/stat`, in clock ticks after boot.
pub fn parse_start_ticks(stat: &str) -> Option<u64> {
    stat_fields(stat)?.get(19)?.parse().ok()
}

/// `btime 1700000000` from `/proc/stat`.
pub fn parse_boot_time(stat: &str) -> Option<u64> {
    stat.lines()
        .find_map(|l| l.strip_prefix("btime"))
        .and_then(|v| v.trim().parse().ok())
}

/// Unix start time of a process from the system and process stat files.
pub fn start_time_seconds(system_stat: &str, process_stat: &str) -> Option<f64> {
    let boot = parse_boot_time(system_stat)?;
    let ticks = parse_start_ticks(process_stat)?;
    Some(boot as f64 + ticks as f64 / USER_HZ)
}

/// Unix start time of the exporter, or `None` off Linux.
pub fn process_start_time() -> Option<f64> {
    let system_stat = fs::read_to_string("/proc/stat").ok()?;
    let process_stat = fs::read_to_string("/proc/self/stat").ok()?;
    start_time_seconds(&system_stat, &process_stat)
}
