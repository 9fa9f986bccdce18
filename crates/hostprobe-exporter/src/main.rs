//! hostprobe exporter binary.
//!
//! - Loads config (`HOSTPROBE_CONFIG` / `hostprobe.yaml`, `METRICS_PORT`)
//! - Spawns the periodic sampling loop
//! - Serves `/`, `/health`, `/metrics` until SIGINT/SIGTERM

use std::future::IntoFuture;

use tracing_subscriber::{fmt, EnvFilter};

use hostprobe_core::error::{ProbeError, Result};
use hostprobe_exporter::sampler::{scheduler, HostInfo, IntervalTrigger, Sampler, Updater};
use hostprobe_exporter::{app_state, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, code = e.code().as_str(), "hostprobe-exporter failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cfg = config::load()?;
    let host = HostInfo::detect(cfg.sampler.host_memory_bytes)?;
    let state = app_state::AppState::new(cfg)?;
    let cfg = state.cfg();

    let sampler = Sampler::from_config(cfg);
    let updater = Updater::new(state.registry(), state.families().clone(), host);
    tracing::info!(
        patterns = ?cfg.sampler.processes,
        interval_ms = cfg.sampler.interval_ms,
        host_memory_bytes = host.total_memory_bytes,
        cores = host.cores,
        "sampling loop starting"
    );
    tokio::spawn(scheduler::run(
        sampler,
        updater,
        IntervalTrigger::new(cfg.sampler.interval()),
    ));

    let listen = cfg.server.listen_addr();
    let listener = tokio::net::TcpListener::bind(listen.as_str())
        .await
        .map_err(|e| ProbeError::Internal(format!("bind {listen} failed: {e}")))?;
    tracing::info!(%listen, "hostprobe-exporter listening; metrics at /metrics");

    let app = router::build_router(state.clone());
    tokio::select! {
        res = axum::serve(listener, app).into_future() => {
            res.map_err(|e| ProbeError::Internal(format!("server failed: {e}")))?;
        }
        signal = shutdown_signal() => {
            tracing::info!(signal, "signal received, exiting");
        }
    }
    Ok(())
}

async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
        "SIGINT"
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                "SIGTERM"
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        s = ctrl_c => s,
        s = terminate => s,
    }
}
