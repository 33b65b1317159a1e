// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process table records and the kernel signal state machine.
//!
//! A [`Pid`] is a kernel-lifetime handle allocated at spawn and never
//! reused. [`transition`] encodes the full signal × state table; the
//! ProcessManager is the only caller that applies it, so every state walk
//! in the kernel is a valid walk of this machine.

use crate::id::AgentUid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Opaque numeric handle of a process inside the kernel.
///
/// Monotonic and unique for the kernel lifetime; a dead pid is never
/// reallocated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl Pid {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Pid {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Lifecycle state of a kernel process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Created,
    Running,
    Sleeping,
    Stopped,
    Paused,
    Zombie,
    Dead,
}

crate::simple_display! {
    ProcessState {
        Created => "created",
        Running => "running",
        Sleeping => "sleeping",
        Stopped => "stopped",
        Paused => "paused",
        Zombie => "zombie",
        Dead => "dead",
    }
}

impl ProcessState {
    /// Terminal states never transition again except zombie → dead via reap.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Zombie | ProcessState::Dead)
    }
}

/// What the agent driving a process is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentPhase {
    Booting,
    Thinking,
    Executing,
    Waiting,
    Observing,
    Idle,
    Completed,
    Failed,
}

crate::simple_display! {
    AgentPhase {
        Booting => "booting",
        Thinking => "thinking",
        Executing => "executing",
        Waiting => "waiting",
        Observing => "observing",
        Idle => "idle",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Kernel-level signals delivered through the ProcessManager.
///
/// These are state-machine inputs, not OS signals; any OS-level side effect
/// (container kill, child process kill) is driven by bus subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "SIGSTOP")]
    Stop,
    #[serde(rename = "SIGCONT")]
    Cont,
    #[serde(rename = "SIGTERM")]
    Term,
    #[serde(rename = "SIGKILL")]
    Kill,
    #[serde(rename = "SIGINT")]
    Int,
}

crate::simple_display! {
    Signal {
        Stop => "SIGSTOP",
        Cont => "SIGCONT",
        Term => "SIGTERM",
        Kill => "SIGKILL",
        Int => "SIGINT",
    }
}

/// Apply a signal to a state, returning the successor state.
///
/// `None` means the signal is not deliverable in that state and must be
/// ignored without a transition (no `process.stateChange` event). *Paused*
/// follows the *stopped* row. *Dead* accepts nothing; only `reap` (a
/// separate ProcessManager operation, not a signal) leaves *zombie*.
pub fn transition(state: ProcessState, signal: Signal) -> Option<ProcessState> {
    use ProcessState::*;
    use Signal::*;

    match (state, signal) {
        (Created | Running | Sleeping, Stop) => Some(Stopped),
        (Running | Sleeping | Stopped | Paused, Cont) => Some(Running),
        (Created | Running | Sleeping | Stopped | Paused, Term) => Some(Zombie),
        (Created | Running | Sleeping | Stopped | Paused | Zombie, Kill) => Some(Zombie),
        (Created | Running | Sleeping, Int) => Some(Zombie),
        _ => None,
    }
}

/// A process table record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: Pid,
    /// Spawning process, 0 for kernel-spawned roots.
    pub parent_pid: Pid,
    /// Stable agent identity across restarts.
    pub uid: AgentUid,
    /// Owning user of the agent, free-form.
    pub owner: String,
    /// Role the agent plays (free-form, e.g. "researcher").
    pub role: String,
    /// The goal the agent works toward.
    pub goal: String,
    pub state: ProcessState,
    pub agent_phase: AgentPhase,
    pub cwd: PathBuf,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
    /// Exit code recorded by `exit`; present once the process reaches zombie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Parameters for spawning a new agent process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnConfig {
    /// Stable agent identity; generated when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<AgentUid>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub role: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_pid: Option<Pid>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Tool names this agent may request; empty means the full native catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// Per-process step ceiling override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    /// Run the agent inside a sandbox container when the runtime is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<crate::sandbox::SandboxConfig>,
}

crate::builder! {
    pub struct SpawnConfigBuilder => SpawnConfig {
        into {
            owner: String = "tester",
            role: String = "worker",
            goal: String = "test goal",
        }
        set {
            uid: Option<AgentUid> = None,
            parent_pid: Option<Pid> = None,
            env: HashMap<String, String> = HashMap::new(),
            tools: Vec<String> = Vec::new(),
            max_steps: Option<u32> = None,
            sandbox: Option<crate::sandbox::SandboxConfig> = None,
        }
    }
}

/// Per-state process counts for `getCounts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCounts {
    pub total: usize,
    pub created: usize,
    pub running: usize,
    pub sleeping: usize,
    pub stopped: usize,
    pub paused: usize,
    pub zombie: usize,
    pub dead: usize,
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
