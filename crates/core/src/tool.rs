// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool schemas: the native catalog entries agents dispatch on, and tools
//! imported from external schema formats.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named, schema-described side effect an agent may request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-schema `{type: "object", properties, required?}` for the args.
    /// Empty object schema when the tool takes free-form args.
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
    /// Gate execution behind a human approval wait.
    #[serde(default)]
    pub requires_approval: bool,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: empty_object_schema(),
            requires_approval: false,
        }
    }

    crate::setters! {
        set {
            parameters: Value,
            requires_approval: bool,
        }
    }
}

/// Schema object with no properties; the export shape for native tools.
pub fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Surface formats the compatibility layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFormat {
    LangChain,
    OpenAi,
}

crate::simple_display! {
    ToolFormat {
        LangChain => "langchain",
        OpenAi => "openai",
    }
}

/// A tool imported through the compatibility layer, persisted by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedTool {
    pub id: String,
    /// Unique key; re-imports upsert.
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub source_format: ToolFormat,
    pub created_at_ms: u64,
}

#[cfg(test)]
#[path = "tool_tests.rs"]
mod tests;
