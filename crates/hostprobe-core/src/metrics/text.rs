//! Plain-text exposition encoder (format version 0.0.4).
//!
//! Rendering works on a `RegistrySnapshot`, never on the live registry. A
//! non-finite sample value aborts the whole render with
//! `ProbeError::Serialization` so a scraper never receives partial output.

use std::fmt::Write;

use crate::error::{ProbeError, Result};

use super::descriptor::MetricKind;
use super::registry::{FamilySnapshot, RegistrySnapshot, SeriesValue};

/// Canonical content type for the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn number(metric: &str, v: f64) -> Result<String> {
    if !v.is_finite() {
        return Err(ProbeError::Serialization(format!(
            "{metric} has non-finite value {v}"
        )));
    }
    Ok(v.to_string())
}

/// `{a="1",b="2"}`, or empty when there are no labels.
fn label_block(names: &[String], values: &[String], extra: Option<(&str, &str)>) -> String {
    let mut pairs: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect();
    if let Some((k, v)) = extra {
        pairs.push(format!("{}=\"{}\"", k, escape_label(v)));
    }
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn render_family(family: &FamilySnapshot, out: &mut String) -> Result<()> {
    let desc = &family.descriptor;
    let name = desc.name.as_str();
    let _ = writeln!(out, "# HELP {} {}", name, escape_help(&desc.help));
    let _ = writeln!(out, "# TYPE {} {}", name, desc.kind.as_str());

    for (values, series) in &family.series {
        match (series, &desc.kind) {
            (SeriesValue::Counter(v) | SeriesValue::Gauge(v), _) => {
                let labels = label_block(&desc.label_names, values, None);
                let _ = writeln!(out, "{}{} {}", name, labels, number(name, *v)?);
            }
            (SeriesValue::Histogram(h), MetricKind::Histogram { buckets }) => {
                for (bound, count) in buckets.iter().zip(&h.bucket_counts) {
                    let le = bound.to_string();
                    let labels = label_block(&desc.label_names, values, Some(("le", le.as_str())));
                    let _ = writeln!(out, "{}_bucket{} {}", name, labels, count);
                }
                let labels = label_block(&desc.label_names, values, Some(("le", "+Inf")));
                let _ = writeln!(out, "{}_bucket{} {}", name, labels, h.count);

                let labels = label_block(&desc.label_names, values, None);
                let _ = writeln!(out, "{}_sum{} {}", name, labels, number(name, h.sum)?);
                let _ = writeln!(out, "{}_count{} {}", name, labels, h.count);
            }
            (SeriesValue::Histogram(_), _) => {
                return Err(ProbeError::Serialization(format!(
                    "{name}: histogram series under a {} family",
                    desc.kind.as_str()
                )));
            }
        }
    }
    Ok(())
}

/// Render every family in the snapshot.
pub fn encode_text(snapshot: &RegistrySnapshot) -> Result<String> {
    let mut out = String::new();
    for family in &snapshot.families {
        render_family(family, &mut out)?;
    }
    Ok(out)
}
