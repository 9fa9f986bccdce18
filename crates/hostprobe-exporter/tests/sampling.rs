//! Sampler + Updater passes driven with in-memory collaborators.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use hostprobe_core::error::ProbeError;
use hostprobe_exporter::sampler::{scheduler, Trigger};

use common::*;

#[tokio::test]
async fn single_npm_process_end_to_end() {
    let mut h = harness();
    h.processes
        .put("npm", vec![proc_info("123", 2.5, 1.0, "npm run build")]);

    scheduler::run_pass(&h.sampler, &mut h.updater).await;

    let labels = ["123", "npm run build"];
    assert_eq!(gauge(&h.state, "npm_process_count", &[]), Some(1.0));
    assert_eq!(
        gauge(&h.state, "npm_process_memory_bytes", &labels),
        Some(HOST_MEMORY as f64 / 100.0)
    );
    assert_eq!(gauge(&h.state, "npm_process_cpu_percent", &labels), Some(2.5));
    assert_eq!(gauge(&h.state, "node_process_count", &[]), Some(0.0));
    assert_eq!(gauge(&h.state, "docker_container_count", &[]), Some(3.0));
    assert_eq!(gauge(&h.state, "npm_package_json_count", &[]), Some(7.0));
}

#[tokio::test]
async fn exited_processes_are_dropped() {
    let mut h = harness();
    h.processes.put(
        "node",
        vec![
            proc_info("1", 10.0, 2.0, "node a.js"),
            proc_info("2", 20.0, 3.0, "node b.js"),
        ],
    );
    scheduler::run_pass(&h.sampler, &mut h.updater).await;

    h.processes.put(
        "node",
        vec![
            proc_info("2", 25.0, 4.0, "node b.js"),
            proc_info("3", 5.0, 1.0, "node c.js"),
        ],
    );
    scheduler::run_pass(&h.sampler, &mut h.updater).await;

    let s = &h.state;
    assert_eq!(gauge(s, "node_process_cpu_percent", &["1", "node a.js"]), None);
    assert_eq!(gauge(s, "node_process_memory_bytes", &["1", "node a.js"]), None);
    assert_eq!(gauge(s, "node_process_cpu_percent", &["2", "node b.js"]), Some(25.0));
    assert_eq!(gauge(s, "node_process_cpu_percent", &["3", "node c.js"]), Some(5.0));
    assert_eq!(
        gauge(s, "node_process_memory_bytes", &["2", "node b.js"]),
        Some(HOST_MEMORY as f64 * 4.0 / 100.0)
    );
    assert_eq!(gauge(s, "node_process_count", &[]), Some(2.0));
    assert_eq!(s.registry().series_count("node_process_cpu_percent").unwrap(), 2);
}

#[tokio::test]
async fn all_processes_gone_clears_series() {
    let mut h = harness();
    h.processes.put("npm", vec![proc_info("9", 1.0, 1.0, "npm start")]);
    scheduler::run_pass(&h.sampler, &mut h.updater).await;

    h.processes.put("npm", vec![]);
    scheduler::run_pass(&h.sampler, &mut h.updater).await;

    assert_eq!(gauge(&h.state, "npm_process_count", &[]), Some(0.0));
    assert_eq!(h.state.registry().series_count("npm_process_memory_bytes").unwrap(), 0);
}

#[tokio::test]
async fn cpu_is_clamped_to_core_capacity() {
    let mut h = harness();
    h.processes.put("npm", vec![proc_info("5", 950.0, 0.5, "npm x")]);
    scheduler::run_pass(&h.sampler, &mut h.updater).await;

    // 4 cores
    assert_eq!(gauge(&h.state, "npm_process_cpu_percent", &["5", "npm x"]), Some(400.0));
}

#[tokio::test]
async fn container_failure_does_not_affect_processes() {
    let procs = vec![proc_info("123", 2.5, 1.0, "npm run build")];

    let mut ok = harness();
    ok.processes.put("npm", procs.clone());
    scheduler::run_pass(&ok.sampler, &mut ok.updater).await;

    let mut broken = harness_with(Arc::new(FakeContainers(Err(ProbeError::collaborator(
        "container",
        "docker: command not found",
    )))));
    broken.processes.put("npm", procs);
    scheduler::run_pass(&broken.sampler, &mut broken.updater).await;

    for (name, labels) in [
        ("npm_process_count", vec![]),
        ("npm_process_memory_bytes", vec!["123", "npm run build"]),
        ("npm_process_cpu_percent", vec!["123", "npm run build"]),
    ] {
        assert_eq!(gauge(&ok.state, name, &labels), gauge(&broken.state, name, &labels));
    }
    assert_eq!(gauge(&broken.state, "docker_container_count", &[]), Some(0.0));
    assert_eq!(
        broken
            .state
            .registry()
            .get("hostprobe_collector_errors_total", &["container"])
            .unwrap()
            .and_then(|v| v.as_f64()),
        Some(1.0)
    );
}

#[tokio::test]
async fn one_failing_pattern_leaves_others_intact() {
    let mut h = harness();
    h.processes.put("npm", vec![proc_info("1", 1.0, 1.0, "npm ci")]);
    h.processes.put("node", vec![proc_info("2", 2.0, 2.0, "node app.js")]);
    h.processes.fail("npm");

    let sample = h.sampler.sample().await;
    assert_eq!(sample.failures, vec!["process"]);
    h.updater.apply(&sample).unwrap();

    assert_eq!(gauge(&h.state, "npm_process_count", &[]), Some(0.0));
    assert_eq!(gauge(&h.state, "node_process_count", &[]), Some(1.0));
    assert_eq!(gauge(&h.state, "node_process_cpu_percent", &["2", "node app.js"]), Some(2.0));
}

#[tokio::test]
async fn hung_collaborator_is_timed_out() {
    let mut h = harness_with(Arc::new(HungContainers));
    h.processes.put("npm", vec![proc_info("1", 1.0, 1.0, "npm ci")]);

    let sample = tokio::time::timeout(std::time::Duration::from_secs(5), h.sampler.sample())
        .await
        .expect("pass must finish despite the hung collaborator");
    assert_eq!(sample.containers, 0);
    assert!(sample.failures.contains(&"container"));

    h.updater.apply(&sample).unwrap();
    assert_eq!(gauge(&h.state, "npm_process_count", &[]), Some(1.0));
}

struct Passes(usize);

#[async_trait]
impl Trigger for Passes {
    async fn tick(&mut self) -> bool {
        if self.0 == 0 {
            return false;
        }
        self.0 -= 1;
        true
    }
}

#[tokio::test]
async fn scheduler_runs_exactly_the_triggered_passes() {
    let h = harness();
    h.processes.put("npm", vec![proc_info("1", 1.0, 1.0, "npm ci")]);
    let state = h.state.clone();

    scheduler::run(h.sampler, h.updater, Passes(3)).await;

    let Some(hostprobe_core::SeriesValue::Histogram(passes)) = state
        .registry()
        .get("hostprobe_sample_duration_seconds", &[])
        .unwrap()
    else {
        panic!("sample duration histogram expected");
    };
    assert_eq!(passes.count, 3);
    assert_eq!(gauge(&state, "npm_process_count", &[]), Some(1.0));
    assert!(gauge(&state, "hostprobe_last_sample_timestamp_seconds", &[]).unwrap() > 0.0);
}
