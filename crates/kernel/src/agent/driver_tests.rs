// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agent::oracle::{Decision, ScriptedOracle};
use crate::agent::tools::{native_registry, SandboxCommandRunner};
use crate::bus::EventBus;
use crate::sandbox::ContainerManager;
use aether_core::{ResourceQuota, Signal, SpawnConfig};
use aether_storage::StateStore;
use parking_lot::Mutex;

struct Fixture {
    bus: EventBus<aether_core::FakeClock>,
    processes: Arc<ProcessManager<aether_core::FakeClock>>,
    governor: Arc<ResourceGovernor<aether_core::FakeClock>>,
    events: Arc<Mutex<Vec<Event>>>,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let clock = aether_core::FakeClock::new();
    let bus = EventBus::new(clock.clone());
    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        bus.subscribe(aether_core::WILDCARD_TOPIC, move |envelope| {
            events.lock().push(envelope.event.clone());
            Ok(())
        });
    }
    let processes =
        Arc::new(ProcessManager::new(bus.clone(), clock.clone(), dir.path().join("ws")));
    let governor = Arc::new(ResourceGovernor::new(
        bus.clone(),
        clock,
        ResourceQuota::default(),
        Arc::clone(&processes),
    ));
    Fixture { bus, processes, governor, events, _dir: dir }
}

fn driver(f: &Fixture, oracle: Arc<dyn Oracle>) -> AgentDriver<aether_core::FakeClock> {
    let clock = aether_core::FakeClock::new();
    let store = Arc::new(StateStore::open(&f._dir.path().join("state")).unwrap());
    let containers = Arc::new(ContainerManager::new(
        f.bus.clone(),
        clock.clone(),
        Duration::from_secs(10),
    ));
    let registry = Arc::new(native_registry(
        f.bus.clone(),
        store,
        Arc::new(SandboxCommandRunner::new(containers)),
    ));
    AgentDriver::new(
        f.bus.clone(),
        Arc::clone(&f.processes),
        Arc::clone(&f.governor),
        registry,
        oracle,
        None,
        clock,
        DriverConfig {
            inter_step: Duration::ZERO,
            approval_timeout: Duration::from_millis(150),
            history_window: 20,
            provider_label: "test".into(),
        },
    )
}

fn think(text: &str) -> Decision {
    Decision {
        reasoning: format!("considering {text}"),
        tool: "think".into(),
        args: serde_json::json!({ "thought": text }),
    }
}

fn topics(f: &Fixture) -> Vec<&'static str> {
    f.events.lock().iter().map(|e| e.topic()).collect()
}

#[tokio::test]
async fn scripted_run_completes_and_exits_zero() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();

    let oracle = Arc::new(ScriptedOracle::new(vec![think("step one")]));
    driver(&f, oracle).run(pid).await;

    let info = f.processes.get(pid).unwrap();
    assert_eq!(info.state, aether_core::ProcessState::Zombie);
    assert_eq!(info.exit_code, Some(0));
    assert_eq!(info.agent_phase, aether_core::AgentPhase::Completed);

    let events = f.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentCompleted { outcome, steps: 2, .. } if outcome == "completed"
    )));
    // Progress fires when the complete tool ends the run.
    assert!(events.iter().any(|e| matches!(e, Event::AgentProgress { .. })));
}

#[tokio::test]
async fn every_action_gets_an_observation_in_order() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();
    let oracle = Arc::new(ScriptedOracle::new(vec![think("a"), think("b")]));
    driver(&f, oracle).run(pid).await;

    let events = f.events.lock();
    let mut pending_actions = 0i32;
    for event in events.iter() {
        match event {
            Event::AgentAction { .. } => pending_actions += 1,
            Event::AgentObservation { .. } => {
                assert!(pending_actions > 0, "observation without a preceding action");
                pending_actions -= 1;
            }
            _ => {}
        }
    }
    assert_eq!(pending_actions, 0);
}

#[tokio::test]
async fn unknown_tool_records_observation_and_continues() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();
    let oracle = Arc::new(ScriptedOracle::new(vec![Decision {
        reasoning: "try something odd".into(),
        tool: "teleport".into(),
        args: serde_json::json!({}),
    }]));
    driver(&f, oracle).run(pid).await;

    let events = f.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentObservation { result, .. } if result == "Unknown tool: teleport"
    )));
    // The loop went on to the scripted-exhausted completion.
    assert!(events.iter().any(|e| matches!(e, Event::AgentCompleted { .. })));
}

#[tokio::test]
async fn oracle_failure_falls_back_to_heuristic() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();
    driver(&f, Arc::new(ScriptedOracle::failing())).run(pid).await;

    // Fallback thinks once, then completes; the loop never deadlocks.
    let events = f.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentAction { tool, .. } if tool == "think"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentCompleted { outcome, .. } if outcome == "completed"
    )));
    assert_eq!(f.processes.get(pid).unwrap().exit_code, Some(0));
}

#[tokio::test]
async fn step_cap_ends_the_run() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();
    f.governor.set_quota(
        pid,
        aether_core::QuotaUpdate { max_steps: Some(2), ..Default::default() },
    );

    let script: Vec<Decision> = (0..10).map(|i| think(&format!("loop {i}"))).collect();
    driver(&f, Arc::new(ScriptedOracle::new(script))).run(pid).await;

    let info = f.processes.get(pid).unwrap();
    assert_eq!(info.state, aether_core::ProcessState::Zombie);
    assert_eq!(info.exit_code, Some(0));

    let events = f.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentThought { thought, .. } if thought.contains("step limit (2)")
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentCompleted { steps: 2, .. }
    )));
}

#[tokio::test]
async fn approval_gate_approves_and_runs_the_tool() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();
    let oracle = Arc::new(ScriptedOracle::new(vec![Decision {
        reasoning: "need a shell".into(),
        tool: "run_command".into(),
        args: serde_json::json!({ "command": "echo approved-path" }),
    }]));

    // Approve as soon as the request shows up.
    {
        let bus = f.bus.clone();
        f.bus.subscribe("process.approval_required", move |envelope| {
            if let Event::ApprovalRequired { pid, .. } = envelope.event {
                let bus = bus.clone();
                tokio::spawn(async move {
                    bus.emit(Event::AgentApproved { pid });
                });
            }
            Ok(())
        });
    }

    driver(&f, oracle).run(pid).await;

    let events = f.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentObservation { result, .. } if result.contains("approved-path")
    )));
}

#[tokio::test]
async fn approval_rejection_skips_the_tool() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();
    let oracle = Arc::new(ScriptedOracle::new(vec![Decision {
        reasoning: "need a shell".into(),
        tool: "run_command".into(),
        args: serde_json::json!({ "command": "echo never" }),
    }]));

    {
        let bus = f.bus.clone();
        f.bus.subscribe("process.approval_required", move |envelope| {
            if let Event::ApprovalRequired { pid, .. } = envelope.event {
                let bus = bus.clone();
                tokio::spawn(async move {
                    bus.emit(Event::AgentRejected { pid });
                });
            }
            Ok(())
        });
    }

    driver(&f, oracle).run(pid).await;

    let events = f.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentObservation { result, .. } if result.contains("Approval denied")
    )));
    assert!(!events.iter().any(|e| matches!(
        e,
        Event::AgentObservation { result, .. } if result.contains("never")
    )));
}

#[tokio::test]
async fn approval_timeout_counts_as_rejection() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();
    let oracle = Arc::new(ScriptedOracle::new(vec![Decision {
        reasoning: "need a shell".into(),
        tool: "run_command".into(),
        args: serde_json::json!({ "command": "echo never" }),
    }]));

    driver(&f, oracle).run(pid).await;

    let events = f.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentObservation { result, .. } if result.contains("Approval denied")
    )));
}

#[tokio::test]
async fn sigterm_cancels_the_loop() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();

    // An endless script; only the signal can end this run.
    let script: Vec<Decision> = (0..1000).map(|i| think(&format!("loop {i}"))).collect();
    let agent_driver = driver(&f, Arc::new(ScriptedOracle::new(script)));

    let task = tokio::spawn(async move { agent_driver.run(pid).await });
    tokio::time::sleep(Duration::from_millis(30)).await;
    f.processes.signal(pid, Signal::Term).unwrap();
    task.await.unwrap();

    let info = f.processes.get(pid).unwrap();
    assert_eq!(info.state, aether_core::ProcessState::Zombie);

    let events = f.events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentCompleted { outcome, .. } if outcome == "cancelled"
    )));
    // The signal path already emitted process.exit; it stays single.
    assert_eq!(
        events.iter().filter(|e| matches!(e, Event::ProcessExit { .. })).count(),
        1
    );
}

#[tokio::test]
async fn paused_process_resumes_on_cont() {
    let f = fixture();
    let pid = f.processes.spawn(SpawnConfig::builder().goal("demo").build()).unwrap();
    f.processes.signal(pid, Signal::Stop).unwrap();

    let agent_driver = driver(&f, Arc::new(ScriptedOracle::new(vec![think("resumed")])));
    let task = tokio::spawn(async move { agent_driver.run(pid).await });

    // Give the loop a few pause polls, then continue it.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(f.events.lock().iter().all(|e| !matches!(e, Event::AgentThought { .. })));

    f.processes.signal(pid, Signal::Cont).unwrap();
    task.await.unwrap();

    assert!(f.events.lock().iter().any(|e| matches!(
        e,
        Event::AgentCompleted { outcome, .. } if outcome == "completed"
    )));
}

#[test]
fn truncation_preserves_char_boundaries() {
    let text = "ééééé";
    let out = truncated(text, 3);
    assert!(out.starts_with("é"));
    assert!(out.ends_with('…'));

    assert_eq!(truncated("short", 10), "short");
}

#[test]
fn window_takes_the_tail() {
    let history: Vec<ChatEntry> =
        (0..30).map(|i| ChatEntry::new(ChatRole::Tool, format!("{i}"), i)).collect();
    let tail = window(&history, 20);
    assert_eq!(tail.len(), 20);
    assert_eq!(tail[0].content, "10");
}
