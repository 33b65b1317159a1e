// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zstd-compressed kernel snapshots.
//!
//! A snapshot captures the process table and usage map so operators can
//! inspect (or a future kernel can adopt) the last known state. Snapshots
//! are advisory; the kernel boots fine without one.

use crate::store::StoreError;
use aether_core::{AgentUsage, Pid, ProcessInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

/// Compression level for snapshot writes. Level 3 is the zstd default.
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSnapshot {
    pub version: u32,
    pub saved_at_ms: u64,
    /// RFC 3339 rendering of `saved_at_ms`, for operators reading the file.
    pub saved_at: String,
    pub processes: Vec<ProcessInfo>,
    pub usage: HashMap<Pid, AgentUsage>,
}

impl KernelSnapshot {
    pub fn new(saved_at_ms: u64, processes: Vec<ProcessInfo>, usage: HashMap<Pid, AgentUsage>) -> Self {
        let saved_at = chrono::DateTime::from_timestamp_millis(saved_at_ms as i64)
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_default();
        Self {
            version: CURRENT_SNAPSHOT_VERSION,
            saved_at_ms,
            saved_at,
            processes,
            usage,
        }
    }

    pub(crate) fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec(self)?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?;

        let tmp_path = path.with_extension("zst.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&compressed)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub(crate) fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        let compressed = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let json = zstd::decode_all(compressed.as_slice())?;
        let snapshot: KernelSnapshot = serde_json::from_slice(&json)?;
        if snapshot.version != CURRENT_SNAPSHOT_VERSION {
            return Err(StoreError::SnapshotVersion {
                found: snapshot.version,
                current: CURRENT_SNAPSHOT_VERSION,
            });
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
