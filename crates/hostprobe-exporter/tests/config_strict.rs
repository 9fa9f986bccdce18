#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use hostprobe_exporter::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
sampler:
  intervall_ms: 5000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.server.port, 9101);
    assert_eq!(cfg.sampler.interval_ms, 10_000);
    assert_eq!(cfg.sampler.processes, vec!["npm", "node"]);
    assert_eq!(cfg.containers.metric, "docker_container_count");
    assert_eq!(cfg.markers.root, "/host/proc");
    assert_eq!(cfg.markers.filename, "package.json");
    assert_eq!(cfg.markers.metric, "npm_package_json_count");
}

#[test]
fn rejects_unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_CONFIG");
}

#[test]
fn rejects_timeout_longer_than_interval() {
    let bad = r#"
version: 1
sampler:
  interval_ms: 2000
  collector_timeout_ms: 3000
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn rejects_colliding_process_prefixes() {
    let bad = r#"
version: 1
sampler:
  processes: ["node.js", "node-js"]
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("collides"));
}

#[test]
fn rejects_invalid_metric_prefix() {
    let bad = r#"
version: 1
sampler:
  processes: ["9p"]
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn port_override_from_env_value() {
    let mut cfg = config::load_from_str("version: 1\n").unwrap();
    config::apply_port_override(&mut cfg, Some("9200")).unwrap();
    assert_eq!(cfg.server.port, 9200);
    assert_eq!(cfg.server.listen_addr(), "0.0.0.0:9200");

    config::apply_port_override(&mut cfg, Some("  ")).unwrap();
    assert_eq!(cfg.server.port, 9200);

    let err = config::apply_port_override(&mut cfg, Some("http")).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_CONFIG");
}
