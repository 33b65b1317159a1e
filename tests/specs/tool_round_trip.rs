// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-format tool schema round-trips.

use super::support::boot;
use aether_core::ToolFormat;

#[tokio::test]
async fn langchain_import_exports_as_openai_function() {
    let t = boot().await;
    let tool = serde_json::json!({
        "name": "web_search",
        "description": "Search the public web",
        "parameters": {
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        }
    });
    t.kernel.compat.import(&[tool], ToolFormat::LangChain).unwrap();

    let exported = t.kernel.compat.export(&[], ToolFormat::OpenAi);
    assert_eq!(exported.len(), 1);
    let entry = &exported[0];
    assert_eq!(entry["type"], "function");
    assert_eq!(entry["function"]["name"], "web_search");
    assert_eq!(entry["function"]["parameters"]["required"], serde_json::json!(["query"]));
}

#[tokio::test]
async fn imports_survive_a_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let state_root = dir.path().join("state");
    {
        let store = aether_storage::StateStore::open(&state_root).unwrap();
        store
            .upsert_tool(aether_core::ImportedTool {
                id: "imp-1".into(),
                name: "lookup".into(),
                description: "Look up".into(),
                parameters: serde_json::json!({ "type": "object", "properties": {} }),
                source_format: ToolFormat::OpenAi,
                created_at_ms: 1,
            })
            .unwrap();
    }
    let store = aether_storage::StateStore::open(&state_root).unwrap();
    assert_eq!(store.list_tools().len(), 1);
    assert_eq!(store.get_tool("lookup").unwrap().description, "Look up");
}
