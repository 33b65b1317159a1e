// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn usage_entry_flattens_usage() {
    let entry = UsageEntry { pid: Pid(2), usage: AgentUsage::new(9) };
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["pid"], 2);
    // Flattened fields sit beside pid, not nested.
    assert_eq!(json["startedAtMs"], 9);
    assert!(json.get("usage").is_none());
}

#[test]
fn kernel_status_round_trips() {
    let status = KernelStatus {
        version: "0.1.0".into(),
        uptime_ms: 12,
        counts: ProcessCounts { total: 1, running: 1, ..Default::default() },
        containers: vec![],
        sandbox_available: false,
    };
    let json = serde_json::to_string(&status).unwrap();
    let parsed: KernelStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, status);
}
