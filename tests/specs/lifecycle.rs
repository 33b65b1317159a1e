// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full agent lifecycle through the assembled kernel.

use super::support::{boot, boot_with};
use aether_core::{Event, ProcessState, Signal, SpawnConfig};
use aether_kernel::Decision;

fn think(text: &str) -> Decision {
    Decision {
        reasoning: format!("considering {text}"),
        tool: "think".into(),
        args: serde_json::json!({ "thought": text }),
    }
}

#[tokio::test]
async fn spawned_agent_thinks_acts_observes_and_completes() {
    let t = boot_with(vec![think("outline"), think("draft")]).await;
    let pid = t
        .kernel
        .spawn_agent(SpawnConfig::builder().goal("write a poem").build())
        .await
        .unwrap();
    t.wait_terminal(pid).await;

    let events = t.recorded();

    // spawned precedes everything else for the pid.
    let first_for_pid = events.iter().position(|e| e.pid() == Some(pid)).unwrap();
    assert_eq!(events[first_for_pid].topic(), "process.spawned");

    // Every action got its observation, in order.
    let mut pending = 0i32;
    for event in &events {
        match event {
            Event::AgentAction { .. } => pending += 1,
            Event::AgentObservation { .. } => {
                assert!(pending > 0);
                pending -= 1;
            }
            _ => {}
        }
    }
    assert_eq!(pending, 0);

    // Exit precedes any reap, and the loop finished cleanly.
    let exit_at = events.iter().position(|e| e.topic() == "process.exit").unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentCompleted { outcome, .. } if outcome == "completed"
    )));
    let info = t.kernel.processes.get(pid).unwrap();
    assert_eq!(info.state, ProcessState::Zombie);
    assert_eq!(info.exit_code, Some(0));

    t.kernel.processes.reap(pid).unwrap();
    let events = t.recorded();
    let dead_at = events
        .iter()
        .position(|e| matches!(e, Event::ProcessStateChange { state: ProcessState::Dead, .. }))
        .unwrap();
    assert!(exit_at < dead_at);
}

#[tokio::test]
async fn sigterm_mid_run_cancels_the_loop() {
    // The first step parks in an approval wait nobody answers, so the
    // signal is what ends the run.
    let t = boot_with(vec![Decision {
        reasoning: "waiting here".into(),
        tool: "run_command".into(),
        args: serde_json::json!({ "command": "echo never" }),
    }])
    .await;
    let pid = t
        .kernel
        .spawn_agent(SpawnConfig::builder().goal("run forever").build())
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    t.kernel.processes.signal(pid, Signal::Term).unwrap();
    t.wait_terminal(pid).await;

    let events = t.recorded();
    assert_eq!(
        events.iter().filter(|e| matches!(e, Event::ProcessExit { .. })).count(),
        1
    );
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentCompleted { outcome, .. } if outcome == "cancelled"
    )));
    assert_eq!(t.kernel.processes.get(pid).unwrap().state, ProcessState::Zombie);
}

#[tokio::test]
async fn approval_round_trip_through_the_bus() {
    let t = boot_with(vec![Decision {
        reasoning: "need a shell".into(),
        tool: "run_command".into(),
        args: serde_json::json!({ "command": "echo approved" }),
    }])
    .await;

    // Approve whenever asked.
    {
        let bus = t.kernel.bus.clone();
        t.kernel.bus.subscribe("process.approval_required", move |envelope| {
            if let Event::ApprovalRequired { pid, .. } = envelope.event {
                let bus = bus.clone();
                tokio::spawn(async move {
                    bus.emit(Event::AgentApproved { pid });
                });
            }
            Ok(())
        });
    }

    let pid = t
        .kernel
        .spawn_agent(SpawnConfig::builder().goal("shell work").build())
        .await
        .unwrap();
    t.wait_terminal(pid).await;

    let events = t.recorded();
    assert!(events.iter().any(|e| matches!(e, Event::ApprovalRequired { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AgentObservation { result, .. } if result.contains("approved")
    )));
}

#[tokio::test]
async fn kernel_shutdown_stops_everything() {
    let t = boot().await;
    let pid = t
        .kernel
        .spawn_agent(SpawnConfig::builder().goal("quick").build())
        .await
        .unwrap();
    t.wait_terminal(pid).await;

    t.kernel.shutdown().await;
    assert!(t
        .kernel
        .processes
        .spawn(SpawnConfig::builder().goal("late").build())
        .is_err());
}
