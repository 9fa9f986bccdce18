//! Registry contract tests: error taxonomy and numeric semantics.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use hostprobe_core::metrics::{HistogramState, MetricDescriptor, Registry, SeriesValue};
use hostprobe_core::encode_text;

fn registry() -> Registry {
    let r = Registry::new();
    r.register(MetricDescriptor::counter("jobs_total", "Jobs", &["queue"]))
        .unwrap();
    r.register(MetricDescriptor::gauge("temp", "Temperature", &["sensor"]))
        .unwrap();
    r.register(MetricDescriptor::histogram(
        "wait_seconds",
        "Wait",
        &["queue"],
        &[0.1, 0.5, 1.0, 5.0],
    ))
    .unwrap();
    r
}

fn counter(r: &Registry, labels: &[&str]) -> f64 {
    r.get("jobs_total", labels)
        .unwrap()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

#[test]
fn duplicate_register_fails() {
    let r = registry();
    let err = r
        .register(MetricDescriptor::gauge("temp", "again", &[]))
        .expect_err("must fail");
    assert_eq!(err.code().as_str(), "DUPLICATE_METRIC");
}

#[test]
fn unknown_metric_fails_for_every_mutation() {
    let r = registry();
    assert_eq!(r.set("nope", &[], 1.0).unwrap_err().code().as_str(), "UNKNOWN_METRIC");
    assert_eq!(r.increment("nope", &[], 1.0).unwrap_err().code().as_str(), "UNKNOWN_METRIC");
    assert_eq!(r.observe("nope", &[], 1.0).unwrap_err().code().as_str(), "UNKNOWN_METRIC");
}

#[test]
fn label_arity_is_checked() {
    let r = registry();
    let err = r.set("temp", &["a", "b"], 1.0).unwrap_err();
    assert_eq!(err.code().as_str(), "LABEL_ARITY_MISMATCH");
    let err = r.increment("jobs_total", &[], 1.0).unwrap_err();
    assert_eq!(err.code().as_str(), "LABEL_ARITY_MISMATCH");
    let err = r.observe("wait_seconds", &["q", "extra"], 0.2).unwrap_err();
    assert_eq!(err.code().as_str(), "LABEL_ARITY_MISMATCH");
}

#[test]
fn counter_is_non_decreasing() {
    let r = registry();
    let mut last = 0.0;
    for delta in [0.0, 1.0, 2.5, 0.0, 10.0] {
        r.increment("jobs_total", &["default"], delta).unwrap();
        let now = counter(&r, &["default"]);
        assert!(now >= last);
        last = now;
    }
    assert_eq!(last, 13.5);
}

#[test]
fn negative_delta_leaves_counter_unchanged() {
    let r = registry();
    r.increment("jobs_total", &["default"], 3.0).unwrap();

    let err = r.increment("jobs_total", &["default"], -1.0).unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DELTA");
    let err = r.increment("jobs_total", &["default"], f64::NAN).unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DELTA");

    assert_eq!(counter(&r, &["default"]), 3.0);
}

#[test]
fn histogram_observe_updates_cumulative_buckets() {
    let r = registry();
    r.observe("wait_seconds", &["q"], 0.7).unwrap();

    let Some(SeriesValue::Histogram(h)) = r.get("wait_seconds", &["q"]).unwrap() else {
        panic!("histogram series expected");
    };
    assert_eq!(
        h,
        HistogramState {
            bucket_counts: vec![0, 0, 1, 1],
            sum: 0.7,
            count: 1,
        }
    );

    // A value exactly on a bound lands in that bound's bucket.
    r.observe("wait_seconds", &["q"], 0.5).unwrap();
    r.observe("wait_seconds", &["q"], 30.0).unwrap();
    let Some(SeriesValue::Histogram(h)) = r.get("wait_seconds", &["q"]).unwrap() else {
        panic!("histogram series expected");
    };
    assert_eq!(h.bucket_counts, vec![0, 1, 2, 2]);
    assert_eq!(h.count, 3);
    assert!((h.sum - 31.2).abs() < 1e-9);
    assert!(h.bucket_counts.windows(2).all(|w| w[0] <= w[1]));
    assert!(h.bucket_counts.iter().all(|&c| c <= h.count));
}

#[test]
fn histogram_rejects_non_finite_observation() {
    let r = registry();
    let err = r.observe("wait_seconds", &["q"], f64::INFINITY).unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_VALUE");
    assert!(r.get("wait_seconds", &["q"]).unwrap().is_none());
}

#[test]
fn replace_gauges_drops_stale_keys() {
    let r = registry();
    r.set("temp", &["a"], 1.0).unwrap();
    r.set("temp", &["b"], 2.0).unwrap();

    let dropped = r
        .transaction(|tx| {
            tx.replace_gauges(
                "temp",
                vec![(vec!["b".to_string()], 20.0), (vec!["c".to_string()], 30.0)],
            )
        })
        .unwrap();

    assert_eq!(dropped, 1);
    assert!(r.get("temp", &["a"]).unwrap().is_none());
    assert_eq!(r.get("temp", &["b"]).unwrap(), Some(SeriesValue::Gauge(20.0)));
    assert_eq!(r.get("temp", &["c"]).unwrap(), Some(SeriesValue::Gauge(30.0)));
}

#[test]
fn snapshot_is_detached_from_later_writes() {
    let r = registry();
    r.set("temp", &["a"], 1.0).unwrap();
    let snap = r.snapshot().unwrap();
    r.set("temp", &["a"], 99.0).unwrap();

    let family = snap.family("temp").unwrap();
    assert_eq!(family.series, vec![(vec!["a".to_string()], SeriesValue::Gauge(1.0))]);
}

#[test]
fn consecutive_encodes_are_identical() {
    let r = registry();
    r.set("temp", &["b"], 2.0).unwrap();
    r.set("temp", &["a"], 1.0).unwrap();
    r.increment("jobs_total", &["x"], 4.0).unwrap();

    let first = encode_text(&r.snapshot().unwrap()).unwrap();
    let second = encode_text(&r.snapshot().unwrap()).unwrap();
    assert_eq!(first, second);

    // Families keep registration order; series are sorted by label values.
    let a = first.find("temp{sensor=\"a\"}").unwrap();
    let b = first.find("temp{sensor=\"b\"}").unwrap();
    assert!(first.find("jobs_total{").unwrap() < a);
    assert!(a < b);
}

#[test]
fn concurrent_writers_do_not_lose_increments() {
    use std::sync::Arc;
    use std::thread;

    let r = Arc::new(registry());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let r = Arc::clone(&r);
            thread::spawn(move || {
                for _ in 0..1000 {
                    r.increment("jobs_total", &["shared"], 1.0).unwrap();
                    let _ = r.snapshot().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(counter(&r, &["shared"]), 8000.0);
}
