//! Thread-safe metric registry.
//!
//! Every family lives behind one registry-wide `Mutex`. Writers either call the
//! single-shot helpers (`set`, `increment`, ...) or batch several mutations in
//! a `transaction`, which is how a sampling pass replaces a whole per-process
//! label set without a scrape ever seeing it half-written.
//!
//! Readers call `snapshot()`, which clones the series under the lock and
//! releases it before any rendering happens.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::error::{ProbeError, Result};

use super::descriptor::{MetricDescriptor, MetricKind};

/// Current value of one series.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValue {
    Counter(f64),
    Gauge(f64),
    Histogram(HistogramState),
}

impl SeriesValue {
    fn zero(kind: &MetricKind) -> Self {
        match kind {
            MetricKind::Counter => SeriesValue::Counter(0.0),
            MetricKind::Gauge => SeriesValue::Gauge(0.0),
            MetricKind::Histogram { buckets } => SeriesValue::Histogram(HistogramState {
                bucket_counts: vec![0; buckets.len()],
                sum: 0.0,
                count: 0,
            }),
        }
    }

    /// Scalar value for counters and gauges.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SeriesValue::Counter(v) | SeriesValue::Gauge(v) => Some(*v),
            SeriesValue::Histogram(_) => None,
        }
    }
}

/// Cumulative histogram state. `bucket_counts[i]` counts observations
/// `<= buckets[i]`; the implicit `+Inf` bucket equals `count`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramState {
    pub bucket_counts: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

struct Family {
    desc: Arc<MetricDescriptor>,
    series: BTreeMap<Vec<String>, SeriesValue>,
}

#[derive(Default)]
struct Inner {
    families: Vec<Family>,
    index: HashMap<String, usize>,
}

impl Inner {
    fn family_mut(&mut self, name: &str, labels: &[&str]) -> Result<&mut Family> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| ProbeError::UnknownMetric(name.to_string()))?;
        let family = &mut self.families[idx];
        let expected = family.desc.label_names.len();
        if labels.len() != expected {
            return Err(ProbeError::LabelArityMismatch {
                metric: name.to_string(),
                expected,
                got: labels.len(),
            });
        }
        Ok(family)
    }

    fn family(&self, name: &str) -> Result<&Family> {
        self.index
            .get(name)
            .map(|&idx| &self.families[idx])
            .ok_or_else(|| ProbeError::UnknownMetric(name.to_string()))
    }
}

fn key(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|v| v.to_string()).collect()
}

fn kind_mismatch(desc: &MetricDescriptor, expected: &'static str) -> ProbeError {
    ProbeError::KindMismatch {
        metric: desc.name.clone(),
        expected,
        actual: desc.kind.as_str(),
    }
}

/// Mutable view of the registry while its lock is held.
pub struct Transaction<'a> {
    inner: &'a mut Inner,
}

impl Transaction<'_> {
    /// Set a gauge series, creating it if needed.
    pub fn set(&mut self, name: &str, labels: &[&str], value: f64) -> Result<()> {
        let family = self.inner.family_mut(name, labels)?;
        if family.desc.kind != MetricKind::Gauge {
            return Err(kind_mismatch(&family.desc, "gauge"));
        }
        family.series.insert(key(labels), SeriesValue::Gauge(value));
        Ok(())
    }

    /// Add a signed delta to a gauge series (missing series start at 0).
    pub fn add(&mut self, name: &str, labels: &[&str], delta: f64) -> Result<()> {
        let family = self.inner.family_mut(name, labels)?;
        if family.desc.kind != MetricKind::Gauge {
            return Err(kind_mismatch(&family.desc, "gauge"));
        }
        let entry = family
            .series
            .entry(key(labels))
            .or_insert(SeriesValue::Gauge(0.0));
        if let SeriesValue::Gauge(v) = entry {
            *v += delta;
        }
        Ok(())
    }

    /// Increase a counter. Negative or non-finite deltas leave it untouched.
    pub fn increment(&mut self, name: &str, labels: &[&str], delta: f64) -> Result<()> {
        let family = self.inner.family_mut(name, labels)?;
        if family.desc.kind != MetricKind::Counter {
            return Err(kind_mismatch(&family.desc, "counter"));
        }
        if !(delta >= 0.0 && delta.is_finite()) {
            return Err(ProbeError::InvalidDelta {
                metric: name.to_string(),
                delta,
            });
        }
        let entry = family
            .series
            .entry(key(labels))
            .or_insert(SeriesValue::Counter(0.0));
        if let SeriesValue::Counter(v) = entry {
            *v += delta;
        }
        Ok(())
    }

    /// Record one observation into every bucket whose bound is `>= value`.
    pub fn observe(&mut self, name: &str, labels: &[&str], value: f64) -> Result<()> {
        let family = self.inner.family_mut(name, labels)?;
        let MetricKind::Histogram { buckets } = &family.desc.kind else {
            return Err(kind_mismatch(&family.desc, "histogram"));
        };
        if !value.is_finite() {
            return Err(ProbeError::InvalidValue {
                metric: name.to_string(),
                value,
            });
        }
        let bucket_len = buckets.len();
        let entry = family.series.entry(key(labels)).or_insert_with(|| {
            SeriesValue::Histogram(HistogramState {
                bucket_counts: vec![0; bucket_len],
                sum: 0.0,
                count: 0,
            })
        });
        if let SeriesValue::Histogram(h) = entry {
            for (count, bound) in h.bucket_counts.iter_mut().zip(buckets) {
                if value <= *bound {
                    *count += 1;
                }
            }
            h.sum += value;
            h.count += 1;
        }
        Ok(())
    }

    /// Replace the full label set of a gauge with `entries`.
    ///
    /// Series whose key is absent from `entries` are removed; the rest are
    /// written with the new values. Returns the number of stale series dropped.
    pub fn replace_gauges<I>(&mut self, name: &str, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (Vec<String>, f64)>,
    {
        let idx = *self
            .inner
            .index
            .get(name)
            .ok_or_else(|| ProbeError::UnknownMetric(name.to_string()))?;
        let family = &mut self.inner.families[idx];
        if family.desc.kind != MetricKind::Gauge {
            return Err(kind_mismatch(&family.desc, "gauge"));
        }

        // Validate everything before touching the family.
        let arity = family.desc.label_names.len();
        let mut fresh = BTreeMap::new();
        for (labels, value) in entries {
            if labels.len() != arity {
                return Err(ProbeError::LabelArityMismatch {
                    metric: name.to_string(),
                    expected: arity,
                    got: labels.len(),
                });
            }
            fresh.insert(labels, SeriesValue::Gauge(value));
        }

        let stale = family
            .series
            .keys()
            .filter(|k| !fresh.contains_key(*k))
            .count();
        if stale > 0 {
            tracing::debug!(metric = %name, stale, "dropping stale series");
        }

        family.series = fresh;
        Ok(stale)
    }
}

/// In-memory registry of metric families and their series.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a metric. Label-less metrics get their single series at zero.
    pub fn register(&self, desc: MetricDescriptor) -> Result<()> {
        desc.validate()?;
        self.transaction(|tx| {
            let inner = &mut *tx.inner;
            if inner.index.contains_key(&desc.name) {
                return Err(ProbeError::DuplicateMetric(desc.name.clone()));
            }
            let mut series = BTreeMap::new();
            if desc.label_names.is_empty() {
                series.insert(Vec::new(), SeriesValue::zero(&desc.kind));
            }
            inner.index.insert(desc.name.clone(), inner.families.len());
            inner.families.push(Family {
                desc: Arc::new(desc),
                series,
            });
            Ok(())
        })
    }

    /// Run `f` with the registry lock held.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ProbeError::Internal("registry lock poisoned".into()))?;
        let mut tx = Transaction { inner: &mut *guard };
        f(&mut tx)
    }

    pub fn set(&self, name: &str, labels: &[&str], value: f64) -> Result<()> {
        self.transaction(|tx| tx.set(name, labels, value))
    }

    pub fn add(&self, name: &str, labels: &[&str], delta: f64) -> Result<()> {
        self.transaction(|tx| tx.add(name, labels, delta))
    }

    pub fn increment(&self, name: &str, labels: &[&str], delta: f64) -> Result<()> {
        self.transaction(|tx| tx.increment(name, labels, delta))
    }

    pub fn observe(&self, name: &str, labels: &[&str], value: f64) -> Result<()> {
        self.transaction(|tx| tx.observe(name, labels, value))
    }

    /// Current value of one series, if present.
    pub fn get(&self, name: &str, labels: &[&str]) -> Result<Option<SeriesValue>> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| ProbeError::Internal("registry lock poisoned".into()))?;
        let family = guard.family(name)?;
        Ok(family.series.get(&key(labels)).cloned())
    }

    /// Number of live series for one metric.
    pub fn series_count(&self, name: &str) -> Result<usize> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| ProbeError::Internal("registry lock poisoned".into()))?;
        Ok(guard.family(name)?.series.len())
    }

    /// Point-in-time copy of every family, in registration order.
    pub fn snapshot(&self) -> Result<RegistrySnapshot> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| ProbeError::Internal("registry lock poisoned".into()))?;
        let families = guard
            .families
            .iter()
            .map(|f| FamilySnapshot {
                descriptor: Arc::clone(&f.desc),
                series: f
                    .series
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })
            .collect();
        Ok(RegistrySnapshot { families })
    }
}

/// One family as captured by `Registry::snapshot`.
#[derive(Debug, Clone)]
pub struct FamilySnapshot {
    pub descriptor: Arc<MetricDescriptor>,
    /// Sorted by label values.
    pub series: Vec<(Vec<String>, SeriesValue)>,
}

/// Immutable copy of the registry handed to the encoder.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub families: Vec<FamilySnapshot>,
}

impl RegistrySnapshot {
    pub fn family(&self, name: &str) -> Option<&FamilySnapshot> {
        self.families.iter().find(|f| f.descriptor.name == name)
    }
}
