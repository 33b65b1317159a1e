// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus events drive the Prometheus counters.

use super::support::boot;
use aether_core::test_support::spawned_event;
use aether_core::{Event, Pid};

#[tokio::test]
async fn spawn_and_tool_counters_match_emits() {
    let t = boot().await;
    t.kernel.bus.emit(spawned_event(1));
    t.kernel.bus.emit(spawned_event(1));
    for tool in ["write_file", "write_file", "run_command"] {
        t.kernel.bus.emit(Event::AgentAction {
            pid: Pid(1),
            tool: tool.into(),
            args: serde_json::json!({}),
        });
    }

    let out = t.kernel.metrics.render();
    assert!(out.contains("aether_agents_total 2\n"));
    assert!(out.contains("aether_tool_executions_total{tool_name=\"write_file\"} 2\n"));
    assert!(out.contains("aether_tool_executions_total{tool_name=\"run_command\"} 1\n"));
}

#[tokio::test]
async fn exposition_carries_help_and_type_lines() {
    let t = boot().await;
    let out = t.kernel.metrics.render();
    assert!(out.contains("# HELP aether_agents_active "));
    assert!(out.contains("# TYPE aether_agents_active gauge"));
    assert!(out.contains("# TYPE aether_agents_total counter"));
    assert!(out.contains("# TYPE aether_llm_latency_seconds histogram"));
}
