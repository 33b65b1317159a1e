// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Histogram cumulativity on the exported metrics.

use super::support::boot;

#[tokio::test]
async fn llm_latency_buckets_are_cumulative() {
    let t = boot().await;
    for latency in [0.15, 0.35, 1.5] {
        t.kernel.metrics.observe_llm_latency("gemini", latency);
    }

    let out = t.kernel.metrics.render();
    let bucket = |le: &str| -> u64 {
        let needle =
            format!("aether_llm_latency_seconds_bucket{{provider=\"gemini\",le=\"{le}\"}} ");
        out.lines()
            .find(|line| line.starts_with(&needle))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
            .unwrap()
    };

    assert_eq!(bucket("0.1"), 0);
    assert_eq!(bucket("0.25"), 1);
    assert_eq!(bucket("0.5"), 2);
    assert_eq!(bucket("2.5"), 3);
    assert_eq!(bucket("+Inf"), 3);
    assert!(out.contains("aether_llm_latency_seconds_count{provider=\"gemini\"} 3\n"));

    let sum: f64 = out
        .lines()
        .find(|line| line.starts_with("aether_llm_latency_seconds_sum{provider=\"gemini\"} "))
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
        .unwrap();
    assert!((sum - 2.0).abs() < 1e-9);
}
