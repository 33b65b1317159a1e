// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL append-only audit log with monotonic ids.
//!
//! One entry per line. The id counter resumes from the last line on open,
//! so ids stay monotonic across restarts. Pruning rewrites the file through
//! a temp-and-rename so a crash mid-prune never loses the log.

use crate::store::StoreError;
use aether_core::{AuditEntry, AuditPage, AuditQuery};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub(crate) struct AuditLog {
    path: PathBuf,
    writer: BufWriter<File>,
    next_id: u64,
}

impl AuditLog {
    pub(crate) fn open(path: &Path) -> Result<Self, StoreError> {
        let next_id = match last_id(path)? {
            Some(id) => id + 1,
            None => 1,
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_id,
        })
    }

    /// Append, stamping the next monotonic id. The line is flushed before
    /// returning so queries on the same store observe the append.
    pub(crate) fn append(&mut self, mut entry: AuditEntry) -> Result<AuditEntry, StoreError> {
        entry.id = self.next_id;
        self.next_id += 1;

        let line = serde_json::to_string(&entry)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(entry)
    }

    pub(crate) fn query(&mut self, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        self.writer.flush()?;

        let mut total = 0usize;
        let mut entries = Vec::new();
        for entry in scan(&self.path)? {
            if !query.matches(&entry) {
                continue;
            }
            if total >= query.offset && entries.len() < query.limit {
                entries.push(entry);
            }
            total += 1;
        }
        Ok(AuditPage { entries, total })
    }

    pub(crate) fn prune(&mut self, cutoff_ms: u64) -> Result<usize, StoreError> {
        self.writer.flush()?;

        let tmp_path = self.path.with_extension("jsonl.tmp");
        let mut removed = 0usize;
        {
            let tmp = File::create(&tmp_path)?;
            let mut tmp_writer = BufWriter::new(tmp);
            for entry in scan(&self.path)? {
                if entry.timestamp_ms < cutoff_ms {
                    removed += 1;
                    continue;
                }
                let line = serde_json::to_string(&entry)?;
                tmp_writer.write_all(line.as_bytes())?;
                tmp_writer.write_all(b"\n")?;
            }
            tmp_writer.flush()?;
            tmp_writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        // Reopen the append handle against the renamed file.
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        Ok(removed)
    }

    pub(crate) fn flush(&mut self) -> Result<(), StoreError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Scan every parseable entry, skipping corrupt lines with a warning.
fn scan(path: &Path) -> Result<Vec<AuditEntry>, StoreError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut entries = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = line_no + 1, error = %e, "skipping corrupt audit line");
            }
        }
    }
    Ok(entries)
}

/// Id of the last well-formed entry, or None for a fresh log.
fn last_id(path: &Path) -> Result<Option<u64>, StoreError> {
    Ok(scan(path)?.last().map(|entry| entry.id))
}

#[cfg(test)]
#[path = "audit_log_tests.rs"]
mod tests;
