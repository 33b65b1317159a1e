// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prometheus text-format metrics.
//!
//! The registry is hand-rolled: the exposition contract fixes family and
//! label-set ordering (insertion order), custom label escaping, and
//! six-decimal cost values, none of which the registry crates reproduce.
//! Families are registered up front by the exporter; unknown names in
//! update calls are logged and dropped rather than auto-created.

mod exporter;

pub use exporter::MetricsExporter;

use indexmap::IndexMap;
use parking_lot::Mutex;

/// The fixed histogram bucket schedule, in seconds.
pub const BUCKETS: [f64; 10] = [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Label pairs in render order.
pub type Labels = Vec<(&'static str, String)>;

/// How a counter value renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Integers render bare, other values with their natural precision.
    Auto,
    /// Always six decimal places (cost counters).
    Fixed6,
}

struct CounterFamily {
    help: &'static str,
    format: ValueFormat,
    series: IndexMap<Labels, f64>,
}

struct GaugeFamily {
    help: &'static str,
    value: f64,
}

#[derive(Default)]
struct HistogramSeries {
    /// Per-bucket (non-cumulative) hit counts; rendered cumulatively.
    bucket_hits: Vec<u64>,
    sum: f64,
    count: u64,
}

struct HistogramFamily {
    help: &'static str,
    series: IndexMap<Labels, HistogramSeries>,
}

enum Family {
    Counter(CounterFamily),
    Gauge(GaugeFamily),
    Histogram(HistogramFamily),
}

#[derive(Default)]
struct Inner {
    families: IndexMap<&'static str, Family>,
}

/// Owner of every metric family. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct MetricsRegistry {
    inner: Mutex<Inner>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_gauge(&self, name: &'static str, help: &'static str) {
        self.inner
            .lock()
            .families
            .insert(name, Family::Gauge(GaugeFamily { help, value: 0.0 }));
    }

    pub fn register_counter(&self, name: &'static str, help: &'static str, format: ValueFormat) {
        self.inner.lock().families.insert(
            name,
            Family::Counter(CounterFamily { help, format, series: IndexMap::new() }),
        );
    }

    pub fn register_histogram(&self, name: &'static str, help: &'static str) {
        self.inner.lock().families.insert(
            name,
            Family::Histogram(HistogramFamily { help, series: IndexMap::new() }),
        );
    }

    pub fn set_gauge(&self, name: &'static str, value: f64) {
        let mut inner = self.inner.lock();
        match inner.families.get_mut(name) {
            Some(Family::Gauge(gauge)) => gauge.value = value,
            _ => tracing::warn!(metric = name, "set_gauge on unregistered gauge"),
        }
    }

    pub fn inc_counter(&self, name: &'static str, labels: Labels, delta: f64) {
        let mut inner = self.inner.lock();
        match inner.families.get_mut(name) {
            Some(Family::Counter(counter)) => {
                *counter.series.entry(labels).or_insert(0.0) += delta;
            }
            _ => tracing::warn!(metric = name, "inc_counter on unregistered counter"),
        }
    }

    pub fn observe(&self, name: &'static str, labels: Labels, value: f64) {
        let mut inner = self.inner.lock();
        match inner.families.get_mut(name) {
            Some(Family::Histogram(histogram)) => {
                let series = histogram.series.entry(labels).or_default();
                if series.bucket_hits.is_empty() {
                    series.bucket_hits = vec![0; BUCKETS.len()];
                }
                if let Some(index) = BUCKETS.iter().position(|bound| value <= *bound) {
                    series.bucket_hits[index] += 1;
                }
                series.sum += value;
                series.count += 1;
            }
            _ => tracing::warn!(metric = name, "observe on unregistered histogram"),
        }
    }

    /// Render the full exposition. Families, then label sets within each
    /// family, appear in insertion order.
    pub fn render(&self) -> String {
        let inner = self.inner.lock();
        let mut out = String::new();

        for (name, family) in &inner.families {
            match family {
                Family::Gauge(gauge) => {
                    header(&mut out, name, gauge.help, "gauge");
                    line(&mut out, name, &[], format_value(gauge.value, ValueFormat::Auto));
                }
                Family::Counter(counter) => {
                    header(&mut out, name, counter.help, "counter");
                    for (labels, value) in &counter.series {
                        line(&mut out, name, labels, format_value(*value, counter.format));
                    }
                }
                Family::Histogram(histogram) => {
                    header(&mut out, name, histogram.help, "histogram");
                    for (labels, series) in &histogram.series {
                        let mut cumulative = 0u64;
                        for (index, bound) in BUCKETS.iter().enumerate() {
                            cumulative += series.bucket_hits.get(index).copied().unwrap_or(0);
                            let mut bucket_labels = labels.clone();
                            bucket_labels.push(("le", trim_float(*bound)));
                            line(
                                &mut out,
                                &format!("{name}_bucket"),
                                &bucket_labels,
                                cumulative.to_string(),
                            );
                        }
                        let mut inf_labels = labels.clone();
                        inf_labels.push(("le", "+Inf".to_string()));
                        line(&mut out, &format!("{name}_bucket"), &inf_labels, series.count.to_string());
                        line(
                            &mut out,
                            &format!("{name}_sum"),
                            labels,
                            format_value(series.sum, ValueFormat::Auto),
                        );
                        line(&mut out, &format!("{name}_count"), labels, series.count.to_string());
                    }
                }
            }
        }
        out
    }
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} {kind}\n"));
}

fn line(out: &mut String, name: &str, labels: &[(&'static str, String)], value: String) {
    if labels.is_empty() {
        out.push_str(&format!("{name} {value}\n"));
    } else {
        let rendered: Vec<String> = labels
            .iter()
            .map(|(key, val)| format!("{key}=\"{}\"", escape_label(val)))
            .collect();
        out.push_str(&format!("{name}{{{}}} {value}\n", rendered.join(",")));
    }
}

/// Escape a label value per the exposition format.
fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn format_value(value: f64, format: ValueFormat) -> String {
    match format {
        ValueFormat::Fixed6 => format!("{value:.6}"),
        ValueFormat::Auto => {
            if value.fract() == 0.0 && value.abs() < 1e15 {
                format!("{}", value as i64)
            } else {
                format!("{value}")
            }
        }
    }
}

/// Bucket bound label: "0.25", "1", "10".
fn trim_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
