// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process table and signal delivery.
//!
//! Owns every [`ProcessInfo`] record; all mutation goes through this
//! manager so the state walks stay valid against the signal machine in
//! `aether_core::process`. Spawn never blocks on containers — sandboxing
//! is driven asynchronously by bus subscribers.

use crate::bus::EventBus;
use aether_core::{
    transition, AgentPhase, AgentUid, Clock, ErrorCode, Event, Pid, ProcessCounts, ProcessInfo,
    ProcessState, Signal, SpawnConfig,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("no such process: {0}")]
    NotFound(Pid),
    #[error("process {pid} is {state}, expected {expected}")]
    WrongState {
        pid: Pid,
        state: ProcessState,
        expected: &'static str,
    },
    #[error("kernel is shutting down, not accepting spawns")]
    ShuttingDown,
    #[error("workspace setup failed: {0}")]
    Workspace(String),
}

impl ProcessError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProcessError::NotFound(_) => ErrorCode::NotFound,
            ProcessError::WrongState { .. } | ProcessError::ShuttingDown => ErrorCode::InvalidInput,
            ProcessError::Workspace(_) => ErrorCode::ExecutionError,
        }
    }
}

struct TableEntry {
    info: ProcessInfo,
    cancel: CancellationToken,
    /// Guards the exactly-once `process.exit` emission.
    exited: bool,
}

/// Owner of the process table.
pub struct ProcessManager<C: Clock> {
    bus: EventBus<C>,
    clock: C,
    workspace_root: PathBuf,
    next_pid: AtomicU32,
    accepting: AtomicBool,
    /// Cancelled at shutdown; every per-process token is a child.
    root_cancel: CancellationToken,
    table: Mutex<HashMap<Pid, TableEntry>>,
}

impl<C: Clock> ProcessManager<C> {
    pub fn new(bus: EventBus<C>, clock: C, workspace_root: PathBuf) -> Self {
        Self {
            bus,
            clock,
            workspace_root,
            next_pid: AtomicU32::new(1),
            accepting: AtomicBool::new(true),
            root_cancel: CancellationToken::new(),
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a pid, create the agent workspace, record the process, and
    /// emit `process.spawned`. The record is observable through [`get`]
    /// before the event fires.
    ///
    /// [`get`]: ProcessManager::get
    pub fn spawn(&self, config: SpawnConfig) -> Result<Pid, ProcessError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(ProcessError::ShuttingDown);
        }

        let pid = Pid(self.next_pid.fetch_add(1, Ordering::SeqCst));
        let uid = config.uid.unwrap_or_default();
        let cwd = self.create_agent_workspace(&uid)?;

        let info = ProcessInfo {
            pid,
            parent_pid: config.parent_pid.unwrap_or(Pid(0)),
            uid,
            owner: config.owner,
            role: config.role,
            goal: config.goal,
            state: ProcessState::Created,
            agent_phase: AgentPhase::Booting,
            cwd,
            env: config.env,
            created_at_ms: self.clock.epoch_ms(),
            terminal_id: None,
            exit_code: None,
        };

        {
            let mut table = self.table.lock();
            table.insert(
                pid,
                TableEntry {
                    info: info.clone(),
                    cancel: self.root_cancel.child_token(),
                    exited: false,
                },
            );
        }

        tracing::info!(%pid, uid = %info.uid, role = %info.role, "process spawned");
        self.bus.emit(Event::ProcessSpawned { pid, info });
        Ok(pid)
    }

    /// Workspace directory under the fs root, owner-only permissions.
    fn create_agent_workspace(&self, uid: &AgentUid) -> Result<PathBuf, ProcessError> {
        let dir = self.workspace_root.join(uid.as_str());
        std::fs::create_dir_all(&dir).map_err(|e| ProcessError::Workspace(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| ProcessError::Workspace(e.to_string()))?;
        }
        Ok(dir)
    }

    pub fn get(&self, pid: Pid) -> Option<ProcessInfo> {
        self.table.lock().get(&pid).map(|entry| entry.info.clone())
    }

    /// All records, ascending by pid.
    pub fn list(&self) -> Vec<ProcessInfo> {
        let mut all: Vec<_> =
            self.table.lock().values().map(|entry| entry.info.clone()).collect();
        all.sort_by_key(|info| info.pid);
        all
    }

    /// Cancellation token observed by the process's agent loop.
    pub fn cancel_token(&self, pid: Pid) -> Option<CancellationToken> {
        self.table.lock().get(&pid).map(|entry| entry.cancel.clone())
    }

    /// Set state (and optionally phase) directly. This is the API used by
    /// the agent loop for its own walk (running, sleeping, zombie); signal
    /// delivery goes through [`signal`].
    ///
    /// [`signal`]: ProcessManager::signal
    pub fn set_state(
        &self,
        pid: Pid,
        state: ProcessState,
        phase: Option<AgentPhase>,
    ) -> Result<(), ProcessError> {
        {
            let mut table = self.table.lock();
            let entry = table.get_mut(&pid).ok_or(ProcessError::NotFound(pid))?;
            if entry.info.state == ProcessState::Dead {
                return Err(ProcessError::WrongState {
                    pid,
                    state: ProcessState::Dead,
                    expected: "not dead",
                });
            }
            if state == ProcessState::Dead {
                return Err(ProcessError::WrongState {
                    pid,
                    state: entry.info.state,
                    expected: "reap to reach dead",
                });
            }
            entry.info.state = state;
            if let Some(phase) = phase {
                entry.info.agent_phase = phase;
            }
        }
        self.bus.emit(Event::ProcessStateChange { pid, state, agent_phase: phase });
        Ok(())
    }

    /// Deliver a kernel signal. Undeliverable signals (per the state table)
    /// are a silent no-op; the current state is returned either way.
    ///
    /// A transition into *zombie* cancels the loop token and emits the
    /// `process.exit` record with the Unix-style `128 + signo` code.
    pub fn signal(&self, pid: Pid, signal: Signal) -> Result<ProcessState, ProcessError> {
        let (next, exit_event) = {
            let mut table = self.table.lock();
            let entry = table.get_mut(&pid).ok_or(ProcessError::NotFound(pid))?;
            let current = entry.info.state;
            let Some(next) = transition(current, signal) else {
                tracing::debug!(%pid, %signal, state = %current, "signal not deliverable, ignoring");
                return Ok(current);
            };

            entry.info.state = next;
            let mut exit_event = None;
            if next == ProcessState::Zombie {
                entry.cancel.cancel();
                if !entry.exited {
                    entry.exited = true;
                    let code = 128 + signal_number(signal);
                    entry.info.exit_code = Some(code);
                    entry.info.agent_phase = AgentPhase::Failed;
                    exit_event = Some(Event::ProcessExit { pid, code, signal: Some(signal) });
                }
            }
            (next, exit_event)
        };

        tracing::info!(%pid, %signal, state = %next, "signal delivered");
        self.bus.emit(Event::ProcessStateChange { pid, state: next, agent_phase: None });
        if let Some(event) = exit_event {
            self.bus.emit(event);
        }
        Ok(next)
    }

    /// Record a voluntary exit: the process enters *zombie* and
    /// `process.exit` is emitted exactly once. Idempotent after the first
    /// call.
    pub fn exit(&self, pid: Pid, code: i32) -> Result<(), ProcessError> {
        let phase = if code == 0 { AgentPhase::Completed } else { AgentPhase::Failed };
        let emit = {
            let mut table = self.table.lock();
            let entry = table.get_mut(&pid).ok_or(ProcessError::NotFound(pid))?;
            if entry.exited {
                false
            } else {
                entry.exited = true;
                entry.info.state = ProcessState::Zombie;
                entry.info.agent_phase = phase;
                entry.info.exit_code = Some(code);
                entry.cancel.cancel();
                true
            }
        };

        if emit {
            self.bus.emit(Event::ProcessStateChange {
                pid,
                state: ProcessState::Zombie,
                agent_phase: Some(phase),
            });
            self.bus.emit(Event::ProcessExit { pid, code, signal: None });
        }
        Ok(())
    }

    /// Reap a zombie: the terminal transition into *dead*. The record stays
    /// in the table (visible through `get`/`getCounts`); resources tied to
    /// the pid are released by subscribers of the state change.
    pub fn reap(&self, pid: Pid) -> Result<(), ProcessError> {
        {
            let mut table = self.table.lock();
            let entry = table.get_mut(&pid).ok_or(ProcessError::NotFound(pid))?;
            if entry.info.state != ProcessState::Zombie {
                return Err(ProcessError::WrongState {
                    pid,
                    state: entry.info.state,
                    expected: "zombie",
                });
            }
            entry.info.state = ProcessState::Dead;
        }
        tracing::info!(%pid, "process reaped");
        self.bus
            .emit(Event::ProcessStateChange { pid, state: ProcessState::Dead, agent_phase: None });
        Ok(())
    }

    pub fn counts(&self) -> ProcessCounts {
        let table = self.table.lock();
        let mut counts = ProcessCounts { total: table.len(), ..Default::default() };
        for entry in table.values() {
            match entry.info.state {
                ProcessState::Created => counts.created += 1,
                ProcessState::Running => counts.running += 1,
                ProcessState::Sleeping => counts.sleeping += 1,
                ProcessState::Stopped => counts.stopped += 1,
                ProcessState::Paused => counts.paused += 1,
                ProcessState::Zombie => counts.zombie += 1,
                ProcessState::Dead => counts.dead += 1,
            }
        }
        counts
    }

    /// Processes not yet zombie or dead.
    pub fn active_count(&self) -> usize {
        self.table
            .lock()
            .values()
            .filter(|entry| !entry.info.state.is_terminal())
            .count()
    }

    /// Stop accepting spawns and cancel every loop token.
    pub fn begin_shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.root_cancel.cancel();
    }
}

/// Conventional Unix numbers for the kernel signal set.
fn signal_number(signal: Signal) -> i32 {
    match signal {
        Signal::Int => 2,
        Signal::Kill => 9,
        Signal::Term => 15,
        Signal::Cont => 18,
        Signal::Stop => 19,
    }
}

#[cfg(test)]
#[path = "proc_tests.rs"]
mod tests;
