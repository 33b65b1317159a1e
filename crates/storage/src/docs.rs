// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed document stores: imported tools (upsert-by-name) and reflections
//! (append-only). Tool writes rewrite the whole file atomically; the tool
//! set is small and read-mostly.

use crate::store::StoreError;
use aether_core::{ImportedTool, ReflectionRecord};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub(crate) struct ToolDocs {
    path: PathBuf,
    by_name: BTreeMap<String, ImportedTool>,
}

impl ToolDocs {
    pub(crate) fn open(path: &Path) -> Result<Self, StoreError> {
        let by_name = match std::fs::read_to_string(path) {
            Ok(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
            Ok(_) => BTreeMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path: path.to_path_buf(), by_name })
    }

    pub(crate) fn upsert(&mut self, tool: ImportedTool) -> Result<(), StoreError> {
        self.by_name.insert(tool.name.clone(), tool);
        self.persist()
    }

    pub(crate) fn get(&self, name: &str) -> Option<ImportedTool> {
        self.by_name.get(name).cloned()
    }

    /// BTreeMap iteration gives name-sorted, stable export order.
    pub(crate) fn list(&self) -> Vec<ImportedTool> {
        self.by_name.values().cloned().collect()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let tmp = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(tmp);
            serde_json::to_writer_pretty(&mut writer, &self.by_name)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Reflections {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Reflections {
    pub(crate) fn open(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { path: path.to_path_buf(), writer: BufWriter::new(file) })
    }

    pub(crate) fn append(&mut self, record: ReflectionRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(&record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub(crate) fn list(&mut self, agent_uid: Option<&str>) -> Result<Vec<ReflectionRecord>, StoreError> {
        self.writer.flush()?;

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ReflectionRecord>(&line) {
                Ok(record) => {
                    if agent_uid.is_none_or(|uid| record.agent_uid == uid) {
                        records.push(record);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "skipping corrupt reflection line");
                }
            }
        }
        Ok(records)
    }

    pub(crate) fn flush(&mut self) -> Result<(), StoreError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "docs_tests.rs"]
mod tests;
