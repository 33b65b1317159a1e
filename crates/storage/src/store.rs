// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! StateStore: open/lock, and the transactional facade over the log and
//! document files. Every public method is a self-contained transaction.

use crate::audit_log::AuditLog;
use crate::docs::{Reflections, ToolDocs};
use crate::snapshot::KernelSnapshot;
use aether_core::{AuditEntry, AuditPage, AuditQuery, ErrorCode, ImportedTool, ReflectionRecord};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("state directory locked by another kernel: {0}")]
    Locked(String),
    #[error("snapshot version {found} unsupported (current {current})")]
    SnapshotVersion { found: u32, current: u32 },
}

impl StoreError {
    /// Stable taxonomy code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Locked(_) => ErrorCode::Fatal,
            StoreError::Io(_) => ErrorCode::Transport,
            StoreError::Serde(_) | StoreError::SnapshotVersion { .. } => ErrorCode::ExecutionError,
        }
    }
}

/// Durable keyed/append-only state under one locked directory.
#[derive(Debug)]
pub struct StateStore {
    root: PathBuf,
    audit: Mutex<AuditLog>,
    tools: Mutex<ToolDocs>,
    reflections: Mutex<Reflections>,
    /// Held for the store lifetime; released on drop.
    _lock: File,
}

impl StateStore {
    /// Open (creating if needed) the state directory and take the exclusive
    /// lock. Failure here is fatal to kernel boot.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;

        let lock_path = root.join("state.lock");
        let lock = File::create(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(lock_path.display().to_string()))?;

        let audit = AuditLog::open(&root.join("audit.jsonl"))?;
        let tools = ToolDocs::open(&root.join("tools.json"))?;
        let reflections = Reflections::open(&root.join("reflections.jsonl"))?;

        tracing::info!(root = %root.display(), "state store opened");
        Ok(Self {
            root: root.to_path_buf(),
            audit: Mutex::new(audit),
            tools: Mutex::new(tools),
            reflections: Mutex::new(reflections),
            _lock: lock,
        })
    }

    // -- audit --

    /// Append an audit entry; the store assigns the monotonic id and
    /// returns the stamped entry.
    pub fn append_audit(&self, entry: AuditEntry) -> Result<AuditEntry, StoreError> {
        self.audit.lock().append(entry)
    }

    /// Filtered, paged scan over the audit log.
    pub fn query_audit(&self, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        self.audit.lock().query(query)
    }

    /// Remove entries older than `cutoff_ms`; returns the removed count.
    /// The rewrite is atomic (temp file + rename).
    pub fn prune_audit(&self, cutoff_ms: u64) -> Result<usize, StoreError> {
        self.audit.lock().prune(cutoff_ms)
    }

    // -- imported tools --

    /// Insert or replace a tool by name.
    pub fn upsert_tool(&self, tool: ImportedTool) -> Result<(), StoreError> {
        self.tools.lock().upsert(tool)
    }

    pub fn get_tool(&self, name: &str) -> Option<ImportedTool> {
        self.tools.lock().get(name)
    }

    /// All imported tools, sorted by name for stable export order.
    pub fn list_tools(&self) -> Vec<ImportedTool> {
        self.tools.lock().list()
    }

    // -- reflections --

    pub fn append_reflection(&self, record: ReflectionRecord) -> Result<(), StoreError> {
        self.reflections.lock().append(record)
    }

    pub fn list_reflections(&self, agent_uid: Option<&str>) -> Result<Vec<ReflectionRecord>, StoreError> {
        self.reflections.lock().list(agent_uid)
    }

    // -- snapshots --

    pub fn save_snapshot(&self, snapshot: &KernelSnapshot) -> Result<(), StoreError> {
        snapshot.save(&self.root.join("snapshot.json.zst"))
    }

    /// Load the latest snapshot; `Ok(None)` when none has been saved.
    pub fn load_snapshot(&self) -> Result<Option<KernelSnapshot>, StoreError> {
        KernelSnapshot::load(&self.root.join("snapshot.json.zst"))
    }

    /// Flush buffered appends to disk. Called from the shutdown drain.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.audit.lock().flush()?;
        self.reflections.lock().flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
