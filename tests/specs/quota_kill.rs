// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session quota breach terminates the offending agent.

use super::support::boot;
use aether_core::{Event, ProcessState, SpawnConfig};

#[tokio::test]
async fn session_token_breach_sigterms_the_agent() {
    let t = boot().await;
    let pid = t
        .kernel
        .processes
        .spawn(SpawnConfig::builder().goal("consume tokens").build())
        .unwrap();

    // 450k tokens: under the 500k default session cap.
    t.kernel.governor.record_token_usage(pid, 400_000, 50_000, "gemini");
    assert_eq!(t.kernel.processes.get(pid).unwrap().state, ProcessState::Created);

    // 70k more crosses the cap on the second record.
    t.kernel.governor.record_token_usage(pid, 60_000, 10_000, "gemini");

    let events = t.recorded();
    let exceeded: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::ResourceExceeded { pid, reason, .. } => Some((*pid, reason.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(exceeded.len(), 1);
    assert_eq!(exceeded[0].0, pid);
    assert!(exceeded[0].1.contains("Session token limit"));

    // SIGTERM landed: the process is a zombie with the exceeded usage intact.
    assert_eq!(t.kernel.processes.get(pid).unwrap().state, ProcessState::Zombie);
    assert_eq!(t.kernel.governor.usage(pid).unwrap().session_tokens(), 520_000);
}

#[tokio::test]
async fn exceeded_process_reaps_to_dead_and_usage_clears() {
    let t = boot().await;
    let pid = t
        .kernel
        .processes
        .spawn(SpawnConfig::builder().goal("consume tokens").build())
        .unwrap();
    t.kernel.governor.record_token_usage(pid, 600_000, 0, "gemini");

    assert_eq!(t.kernel.processes.get(pid).unwrap().state, ProcessState::Zombie);
    t.kernel.processes.reap(pid).unwrap();
    assert_eq!(t.kernel.processes.get(pid).unwrap().state, ProcessState::Dead);
    assert!(t.kernel.governor.usage(pid).is_none());
}
