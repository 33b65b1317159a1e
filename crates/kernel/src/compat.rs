// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool schema import/export between the LangChain and OpenAI surface
//! formats.
//!
//! Imports are validated, persisted by name (upsert) through the
//! StateStore, and announced on the bus. Exports merge the native catalog
//! (schemas reduced to empty properties) with every imported tool,
//! re-wrapped in the requested format. Same-format round-trips are the
//! identity on {name, description, properties, required}.

use crate::bus::EventBus;
use aether_core::{
    tool::empty_object_schema, Clock, ErrorCode, Event, ImportedTool, ToolFormat, ToolSpec,
};
use aether_storage::{StateStore, StoreError};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompatError {
    #[error("tool #{index} is not an object")]
    NotAnObject { index: usize },
    #[error("tool #{index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl CompatError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CompatError::Store(e) => e.code(),
            _ => ErrorCode::InvalidInput,
        }
    }
}

pub struct ToolCompatLayer<C: Clock> {
    bus: EventBus<C>,
    store: Arc<StateStore>,
    clock: C,
}

impl<C: Clock> ToolCompatLayer<C> {
    pub fn new(bus: EventBus<C>, store: Arc<StateStore>, clock: C) -> Self {
        Self { bus, store, clock }
    }

    /// Import tool schemas. Every entry must carry `name` and
    /// `description`; re-imported names replace the stored tool.
    pub fn import(
        &self,
        items: &[Value],
        format: ToolFormat,
    ) -> Result<Vec<ImportedTool>, CompatError> {
        let mut imported = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            imported.push(self.parse_one(item, format, index)?);
        }

        for tool in &imported {
            self.store.upsert_tool(tool.clone())?;
        }

        let names: Vec<String> = imported.iter().map(|tool| tool.name.clone()).collect();
        tracing::info!(count = imported.len(), %format, "tools imported");
        self.bus.emit(Event::ToolsImported { count: imported.len(), format, names });
        Ok(imported)
    }

    fn parse_one(
        &self,
        item: &Value,
        format: ToolFormat,
        index: usize,
    ) -> Result<ImportedTool, CompatError> {
        // The OpenAI surface nests the schema under `function`.
        let body = match format {
            ToolFormat::LangChain => item,
            ToolFormat::OpenAi => item.get("function").unwrap_or(item),
        };
        if !body.is_object() {
            return Err(CompatError::NotAnObject { index });
        }

        let name = required_str(body, "name", index)?;
        let description = required_str(body, "description", index)?;
        let parameters = body.get("parameters").cloned().unwrap_or_else(empty_object_schema);

        Ok(ImportedTool {
            id: format!("imp-{}", nanoid::nanoid!(12)),
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            source_format: format,
            created_at_ms: self.clock.epoch_ms(),
        })
    }

    /// Export the merged catalog (native tools first, then imported, both
    /// in stable order) in the requested surface format.
    pub fn export(&self, native: &[ToolSpec], format: ToolFormat) -> Vec<Value> {
        let mut out = Vec::new();
        for spec in native {
            // Native schemas are kernel-internal; exports carry an empty
            // properties object.
            out.push(wrap(&spec.name, &spec.description, empty_object_schema(), format));
        }
        for tool in self.store.list_tools() {
            out.push(wrap(&tool.name, &tool.description, tool.parameters, format));
        }

        tracing::info!(count = out.len(), %format, "tools exported");
        self.bus.emit(Event::ToolsExported { count: out.len(), format });
        out
    }
}

fn required_str<'a>(
    body: &'a Value,
    field: &'static str,
    index: usize,
) -> Result<&'a str, CompatError> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .ok_or(CompatError::MissingField { index, field })
}

fn wrap(name: &str, description: &str, parameters: Value, format: ToolFormat) -> Value {
    match format {
        ToolFormat::LangChain => serde_json::json!({
            "name": name,
            "description": description,
            "parameters": parameters,
        }),
        ToolFormat::OpenAi => serde_json::json!({
            "type": "function",
            "function": {
                "name": name,
                "description": description,
                "parameters": parameters,
            },
        }),
    }
}

#[cfg(test)]
#[path = "compat_tests.rs"]
mod tests;
