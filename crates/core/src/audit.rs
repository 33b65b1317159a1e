// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit trail records and query types.

use crate::process::Pid;
use serde::{Deserialize, Serialize};

/// Category of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    #[serde(rename = "tool.invocation")]
    ToolInvocation,
    #[serde(rename = "auth")]
    Auth,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "resource")]
    Resource,
}

crate::simple_display! {
    AuditEventType {
        ToolInvocation => "tool.invocation",
        Auth => "auth",
        Admin => "admin",
        Resource => "resource",
    }
}

/// One appended audit record.
///
/// `args_sanitized` and `metadata` are JSON strings (already redacted);
/// `result_hash` is the SHA-256 hex of the first 1000 chars of the raw
/// result, or `None` when the action produced no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic id assigned by the store on append.
    pub id: u64,
    pub timestamp_ms: u64,
    pub event_type: AuditEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_pid: Option<Pid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_uid: Option<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub args_sanitized: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Default audit query page size.
pub const DEFAULT_AUDIT_PAGE_SIZE: usize = 50;

/// Filtered, paged audit query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<Pid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<AuditEventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<u64>,
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            pid: None,
            uid: None,
            action: None,
            event_type: None,
            start_ms: None,
            end_ms: None,
            limit: DEFAULT_AUDIT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl AuditQuery {
    /// True when the entry passes every set filter.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(pid) = self.pid {
            if entry.actor_pid != Some(pid) {
                return false;
            }
        }
        if let Some(ref uid) = self.uid {
            if entry.actor_uid.as_deref() != Some(uid.as_str()) {
                return false;
            }
        }
        if let Some(ref action) = self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if entry.event_type != event_type {
                return false;
            }
        }
        if let Some(start) = self.start_ms {
            if entry.timestamp_ms < start {
                return false;
            }
        }
        if let Some(end) = self.end_ms {
            if entry.timestamp_ms > end {
                return false;
            }
        }
        true
    }
}

/// One page of audit results plus the unpaged match count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total: usize,
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
