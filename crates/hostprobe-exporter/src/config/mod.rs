//! Exporter config loader (strict parsing + env override).

pub mod schema;

use std::fs;
use std::path::Path;

use hostprobe_core::error::{ProbeError, Result};

pub use schema::{
    ContainerSection, ExporterConfig, MarkerSection, SamplerSection, ServerSection,
};

/// Config file used when `HOSTPROBE_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "hostprobe.yaml";
/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "HOSTPROBE_CONFIG";
/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "METRICS_PORT";

pub fn load_from_file(path: &str) -> Result<ExporterConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ProbeError::BadConfig(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ExporterConfig> {
    let cfg: ExporterConfig = serde_yaml::from_str(s)
        .map_err(|e| ProbeError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the config the binary runs with.
///
/// An explicit `HOSTPROBE_CONFIG` must exist; the default file is optional and
/// built-in defaults apply without it. `METRICS_PORT` is applied last.
pub fn load() -> Result<ExporterConfig> {
    let mut cfg = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_from_file(&path)?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from_file(DEFAULT_CONFIG_PATH)?,
        Err(_) => ExporterConfig::default(),
    };
    apply_port_override(&mut cfg, std::env::var(PORT_ENV).ok().as_deref())?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn apply_port_override(cfg: &mut ExporterConfig, raw: Option<&str>) -> Result<()> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    cfg.server.port = raw
        .parse()
        .map_err(|_| ProbeError::BadConfig(format!("{PORT_ENV} must be a port number, got {raw:?}")))?;
    Ok(())
}
