// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for tests across the workspace.

use crate::event::Event;
use crate::process::{AgentPhase, Pid, ProcessInfo, ProcessState};

/// A minimal process record for tests that need one without a manager.
pub fn process_info(pid: u32) -> ProcessInfo {
    ProcessInfo {
        pid: Pid(pid),
        parent_pid: Pid(0),
        uid: crate::id::AgentUid::from_string(format!("agt-test-{pid}")),
        owner: "tester".into(),
        role: "worker".into(),
        goal: "test goal".into(),
        state: ProcessState::Created,
        agent_phase: AgentPhase::Booting,
        cwd: std::path::PathBuf::from("/tmp"),
        env: Default::default(),
        created_at_ms: 0,
        terminal_id: None,
        exit_code: None,
    }
}

/// Spawned event for the given pid, for feeding buses in tests.
pub fn spawned_event(pid: u32) -> Event {
    Event::ProcessSpawned { pid: Pid(pid), info: process_info(pid) }
}
