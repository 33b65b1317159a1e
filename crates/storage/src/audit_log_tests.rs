// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aether_core::{AuditEventType, Pid};

fn draft(ts: u64, action: &str) -> AuditEntry {
    AuditEntry {
        id: 0,
        timestamp_ms: ts,
        event_type: AuditEventType::ToolInvocation,
        actor_pid: Some(Pid(1)),
        actor_uid: None,
        action: action.into(),
        target: None,
        args_sanitized: "{}".into(),
        result_hash: None,
        metadata: None,
    }
}

#[test]
fn append_assigns_monotonic_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let mut log = AuditLog::open(&path).unwrap();

    let a = log.append(draft(10, "one")).unwrap();
    let b = log.append(draft(20, "two")).unwrap();
    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
}

#[test]
fn ids_resume_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    {
        let mut log = AuditLog::open(&path).unwrap();
        log.append(draft(10, "one")).unwrap();
        log.append(draft(20, "two")).unwrap();
    }
    let mut log = AuditLog::open(&path).unwrap();
    let c = log.append(draft(30, "three")).unwrap();
    assert_eq!(c.id, 3);
}

#[test]
fn query_pages_and_counts_total() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let mut log = AuditLog::open(&path).unwrap();
    for i in 0..10 {
        log.append(draft(i, "act")).unwrap();
    }

    let page = log
        .query(&AuditQuery { limit: 3, offset: 4, ..Default::default() })
        .unwrap();
    assert_eq!(page.total, 10);
    assert_eq!(page.entries.len(), 3);
    assert_eq!(page.entries[0].id, 5);
}

#[test]
fn query_applies_filters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let mut log = AuditLog::open(&path).unwrap();
    log.append(draft(10, "alpha")).unwrap();
    log.append(draft(20, "beta")).unwrap();
    log.append(draft(30, "alpha")).unwrap();

    let page = log
        .query(&AuditQuery { action: Some("alpha".into()), ..Default::default() })
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.entries.iter().all(|e| e.action == "alpha"));
}

#[test]
fn prune_removes_old_entries_and_keeps_appending() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let mut log = AuditLog::open(&path).unwrap();
    log.append(draft(10, "old")).unwrap();
    log.append(draft(20, "old")).unwrap();
    log.append(draft(100, "new")).unwrap();

    let removed = log.prune(50).unwrap();
    assert_eq!(removed, 2);

    let page = log.query(&AuditQuery::default()).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.entries[0].action, "new");

    // Ids keep ascending past the prune.
    let d = log.append(draft(200, "after")).unwrap();
    assert_eq!(d.id, 4);
}

#[test]
fn corrupt_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let mut log = AuditLog::open(&path).unwrap();
    log.append(draft(10, "ok")).unwrap();
    drop(log);

    use std::io::Write;
    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(f, "{{not json").unwrap();

    let mut log = AuditLog::open(&path).unwrap();
    let page = log.query(&AuditQuery::default()).unwrap();
    assert_eq!(page.total, 1);
}
