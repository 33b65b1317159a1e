// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::EventBus;
use aether_core::FakeClock;
use parking_lot::Mutex;

struct Fixture {
    layer: ToolCompatLayer<FakeClock>,
    events: Arc<Mutex<Vec<Event>>>,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(FakeClock::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        bus.subscribe(aether_core::WILDCARD_TOPIC, move |envelope| {
            events.lock().push(envelope.event.clone());
            Ok(())
        });
    }
    let store = Arc::new(StateStore::open(&dir.path().join("state")).unwrap());
    let layer = ToolCompatLayer::new(bus, store, FakeClock::new());
    Fixture { layer, events, _dir: dir }
}

fn web_search_langchain() -> Value {
    serde_json::json!({
        "name": "web_search",
        "description": "Search the web",
        "parameters": {
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        }
    })
}

#[test]
fn langchain_import_exports_as_openai() {
    let f = fixture();
    f.layer.import(&[web_search_langchain()], ToolFormat::LangChain).unwrap();

    let exported = f.layer.export(&[], ToolFormat::OpenAi);
    assert_eq!(exported.len(), 1);
    let entry = &exported[0];
    assert_eq!(entry["type"], "function");
    assert_eq!(entry["function"]["name"], "web_search");
    assert_eq!(entry["function"]["parameters"]["required"], serde_json::json!(["query"]));
    assert_eq!(
        entry["function"]["parameters"]["properties"]["query"]["type"],
        "string"
    );
}

#[test]
fn openai_import_unwraps_function() {
    let f = fixture();
    let openai_tool = serde_json::json!({
        "type": "function",
        "function": {
            "name": "lookup",
            "description": "Look things up",
            "parameters": { "type": "object", "properties": {} }
        }
    });
    let imported = f.layer.import(&[openai_tool], ToolFormat::OpenAi).unwrap();
    assert_eq!(imported[0].name, "lookup");
    assert_eq!(imported[0].source_format, ToolFormat::OpenAi);
}

#[test]
fn same_format_round_trip_is_identity() {
    let f = fixture();
    let original = web_search_langchain();
    f.layer.import(&[original.clone()], ToolFormat::LangChain).unwrap();

    let exported = f.layer.export(&[], ToolFormat::LangChain);
    assert_eq!(exported[0]["name"], original["name"]);
    assert_eq!(exported[0]["description"], original["description"]);
    assert_eq!(exported[0]["parameters"], original["parameters"]);
}

#[test]
fn import_upserts_by_name() {
    let f = fixture();
    f.layer.import(&[web_search_langchain()], ToolFormat::LangChain).unwrap();

    let mut updated = web_search_langchain();
    updated["description"] = "Search the web, v2".into();
    f.layer.import(&[updated], ToolFormat::LangChain).unwrap();

    let exported = f.layer.export(&[], ToolFormat::LangChain);
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0]["description"], "Search the web, v2");
}

#[test]
fn import_requires_name_and_description() {
    let f = fixture();
    let missing_description = serde_json::json!({ "name": "x" });
    let err = f.layer.import(&[missing_description], ToolFormat::LangChain).unwrap_err();
    assert!(matches!(
        err,
        CompatError::MissingField { index: 0, field: "description" }
    ));
    assert_eq!(err.code(), ErrorCode::InvalidInput);

    let not_object = serde_json::json!("just a string");
    assert!(matches!(
        f.layer.import(&[not_object], ToolFormat::LangChain).unwrap_err(),
        CompatError::NotAnObject { index: 0 }
    ));
}

#[test]
fn native_tools_export_with_empty_properties() {
    let f = fixture();
    let native = ToolSpec::new("think", "Reason about the goal").parameters(serde_json::json!({
        "type": "object",
        "properties": { "thought": { "type": "string" } },
        "required": ["thought"]
    }));

    let exported = f.layer.export(&[native], ToolFormat::LangChain);
    assert_eq!(exported[0]["name"], "think");
    assert_eq!(exported[0]["parameters"]["properties"], serde_json::json!({}));
}

#[test]
fn import_and_export_emit_events() {
    let f = fixture();
    f.layer.import(&[web_search_langchain()], ToolFormat::LangChain).unwrap();
    f.layer.export(&[], ToolFormat::OpenAi);

    let events = f.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ToolsImported { count: 1, format: ToolFormat::LangChain, names } if names == &vec!["web_search".to_string()]
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ToolsExported { count: 1, format: ToolFormat::OpenAi })));
}
