// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The audit trail: bus-driven entries, redaction, retention.
//!
//! Subscribes on construction to the audited topics and appends an entry
//! per event through the StateStore. Sensitive argument fields are redacted
//! at any nesting depth before serialization; results are stored as a
//! SHA-256 of their first 1000 characters, never verbatim.

use crate::bus::{EventBus, HandlerError, SubscriberId};
use aether_core::{
    AuditEntry, AuditEventType, AuditPage, AuditQuery, Clock, Event, Pid,
};
use aether_storage::{StateStore, StoreError};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Argument field names that never reach disk, matched case-insensitively
/// at any depth.
const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "secret",
    "token",
    "apikey",
    "api_key",
    "credentials",
    "authorization",
];

const REDACTED: &str = "[REDACTED]";

/// Result hashes cover at most this many characters of the raw result.
const RESULT_HASH_PREFIX: usize = 1000;

/// How often the retention task prunes old entries.
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

pub struct AuditLogger<C: Clock> {
    bus: EventBus<C>,
    store: Arc<StateStore>,
    clock: C,
    retention_ms: u64,
    subscriptions: Mutex<Vec<SubscriberId>>,
    prune_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl<C: Clock> AuditLogger<C> {
    /// Construct and subscribe. The retention task is started separately
    /// with [`start_retention`](AuditLogger::start_retention) because it
    /// needs a runtime.
    pub fn new(
        bus: EventBus<C>,
        store: Arc<StateStore>,
        clock: C,
        retention_days: u32,
    ) -> Arc<Self> {
        let logger = Arc::new(Self {
            bus,
            store,
            clock,
            retention_ms: retention_days as u64 * 24 * 60 * 60 * 1000,
            subscriptions: Mutex::new(Vec::new()),
            prune_task: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });
        logger.subscribe_all();
        logger
    }

    fn subscribe_all(self: &Arc<Self>) {
        let topics = [
            "process.spawned",
            "process.exit",
            "agent.action",
            "resource.exceeded",
            "workspace.cleaned",
        ];
        let mut subs = self.subscriptions.lock();
        for topic in topics {
            let this = Arc::clone(self);
            subs.push(self.bus.subscribe(topic, move |envelope| {
                this.record_event(&envelope.event)
                    .map_err(|e| HandlerError::new(format!("audit append failed: {e}")))
            }));
        }
    }

    fn record_event(&self, event: &Event) -> Result<(), StoreError> {
        let entry = match event {
            Event::ProcessSpawned { pid, info } => self.draft(
                AuditEventType::Admin,
                Some(*pid),
                Some(info.uid.to_string()),
                "process.spawned",
                None,
                serde_json::json!({ "role": info.role, "goal": info.goal }),
            ),
            Event::ProcessExit { pid, code, signal } => self.draft(
                AuditEventType::Admin,
                Some(*pid),
                None,
                "process.exit",
                None,
                serde_json::json!({ "code": code, "signal": signal }),
            ),
            Event::AgentAction { pid, tool, args } => self.draft(
                AuditEventType::ToolInvocation,
                Some(*pid),
                None,
                &format!("tool:{tool}"),
                Some(tool.clone()),
                args.clone(),
            ),
            Event::ResourceExceeded { pid, reason, usage } => self.draft(
                AuditEventType::Resource,
                Some(*pid),
                None,
                "resource.exceeded",
                None,
                serde_json::json!({ "reason": reason, "sessionTokens": usage.session_tokens() }),
            ),
            Event::WorkspaceCleaned { agent_name, success } => self.draft(
                AuditEventType::Admin,
                None,
                None,
                "workspace.cleaned",
                Some(agent_name.clone()),
                serde_json::json!({ "success": success }),
            ),
            _ => return Ok(()),
        };
        self.store.append_audit(entry)?;
        Ok(())
    }

    fn draft(
        &self,
        event_type: AuditEventType,
        actor_pid: Option<Pid>,
        actor_uid: Option<String>,
        action: &str,
        target: Option<String>,
        args: Value,
    ) -> AuditEntry {
        AuditEntry {
            id: 0,
            timestamp_ms: self.clock.epoch_ms(),
            event_type,
            actor_pid,
            actor_uid,
            action: action.to_string(),
            target,
            args_sanitized: sanitize(&args).to_string(),
            result_hash: None,
            metadata: None,
        }
    }

    /// Explicit audit of a tool invocation with its (hashed) result.
    pub fn log_tool_invocation(
        &self,
        pid: Pid,
        uid: Option<String>,
        tool: &str,
        args: &Value,
        result: Option<&str>,
    ) -> Result<AuditEntry, StoreError> {
        let mut entry = self.draft(
            AuditEventType::ToolInvocation,
            Some(pid),
            uid,
            &format!("tool:{tool}"),
            Some(tool.to_string()),
            args.clone(),
        );
        entry.result_hash = result.map(result_hash);
        self.store.append_audit(entry)
    }

    /// Explicit audit of an authentication event.
    pub fn log_auth_event(
        &self,
        actor_uid: Option<String>,
        action: &str,
        metadata: Option<Value>,
    ) -> Result<AuditEntry, StoreError> {
        let mut entry =
            self.draft(AuditEventType::Auth, None, actor_uid, action, None, Value::Null);
        entry.metadata = metadata.map(|m| sanitize(&m).to_string());
        self.store.append_audit(entry)
    }

    /// Explicit audit of an administrative action.
    pub fn log_admin_action(
        &self,
        actor_uid: Option<String>,
        action: &str,
        target: Option<String>,
        args: Value,
    ) -> Result<AuditEntry, StoreError> {
        let entry = self.draft(AuditEventType::Admin, None, actor_uid, action, target, args);
        self.store.append_audit(entry)
    }

    /// Generic audit append.
    pub fn log(
        &self,
        event_type: AuditEventType,
        actor_pid: Option<Pid>,
        action: &str,
        args: Value,
    ) -> Result<AuditEntry, StoreError> {
        let entry = self.draft(event_type, actor_pid, None, action, None, args);
        self.store.append_audit(entry)
    }

    /// Query the trail (boundary surface, §-default page size applies
    /// through [`AuditQuery::default`]).
    pub fn query(&self, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        self.store.query_audit(query)
    }

    /// Start the hourly retention prune.
    pub fn start_retention(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
            // The immediate first tick would prune at boot; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                this.prune_once();
            }
        });
        *self.prune_task.lock() = Some(handle);
    }

    /// One retention pass; public so tests and operators can force it.
    pub fn prune_once(&self) {
        let cutoff = self.clock.epoch_ms().saturating_sub(self.retention_ms);
        match self.store.prune_audit(cutoff) {
            Ok(removed) if removed > 0 => {
                tracing::info!(removed, "audit retention pruned old entries");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "audit retention prune failed"),
        }
    }

    /// Stop the prune task and unsubscribe. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.prune_task.lock().take() {
            handle.abort();
        }
        for id in self.subscriptions.lock().drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

/// Replace sensitive fields with `[REDACTED]` at any depth. Arrays and
/// nested objects are recursed; non-object values pass through.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                let lowered = key.to_lowercase();
                if SENSITIVE_FIELDS.contains(&lowered.as_str()) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), sanitize(val));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

/// SHA-256 hex of the first 1000 characters of the raw result.
pub fn result_hash(result: &str) -> String {
    let prefix: String = result.chars().take(RESULT_HASH_PREFIX).collect();
    format!("{:x}", Sha256::digest(prefix.as_bytes()))
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
