// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types routed through the kernel bus.
//!
//! Serializes with `{"type": "<topic>", ...fields}` format; the serde tag
//! is the wire topic. Unknown type tags deserialize to `Custom`.

use crate::process::{AgentPhase, Pid, ProcessInfo, ProcessState, Signal};
use crate::quota::AgentUsage;
use crate::tool::ToolFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The bus channel that receives every event, wrapped as `{topic, payload}`.
pub const WILDCARD_TOPIC: &str = "*";

/// Events that flow through the kernel bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- process --
    #[serde(rename = "process.spawned")]
    ProcessSpawned { pid: Pid, info: ProcessInfo },

    #[serde(rename = "process.stateChange")]
    #[serde(rename_all = "camelCase")]
    ProcessStateChange {
        pid: Pid,
        state: ProcessState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_phase: Option<AgentPhase>,
    },

    #[serde(rename = "process.exit")]
    ProcessExit {
        pid: Pid,
        code: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<Signal>,
    },

    /// A tool needs human approval before it runs.
    #[serde(rename = "process.approval_required")]
    ApprovalRequired { pid: Pid, action: String, details: Value },

    // -- agent --
    #[serde(rename = "agent.thought")]
    AgentThought { pid: Pid, thought: String },

    #[serde(rename = "agent.action")]
    AgentAction { pid: Pid, tool: String, args: Value },

    #[serde(rename = "agent.observation")]
    AgentObservation { pid: Pid, result: String },

    #[serde(rename = "agent.progress")]
    #[serde(rename_all = "camelCase")]
    AgentProgress {
        pid: Pid,
        step: u32,
        max_steps: u32,
        summary: String,
    },

    #[serde(rename = "agent.approved")]
    AgentApproved { pid: Pid },

    #[serde(rename = "agent.rejected")]
    AgentRejected { pid: Pid },

    #[serde(rename = "agent.completed")]
    #[serde(rename_all = "camelCase")]
    AgentCompleted {
        pid: Pid,
        /// "completed", "failed", or "cancelled".
        outcome: String,
        steps: u32,
        duration_ms: u64,
    },

    // -- resource --
    #[serde(rename = "resource.usage")]
    ResourceUsage { pid: Pid, usage: AgentUsage },

    #[serde(rename = "resource.exceeded")]
    ResourceExceeded {
        pid: Pid,
        reason: String,
        usage: AgentUsage,
    },

    // -- container --
    #[serde(rename = "container.created")]
    #[serde(rename_all = "camelCase")]
    ContainerCreated {
        pid: Pid,
        container_id: String,
        image: String,
    },

    #[serde(rename = "container.started")]
    #[serde(rename_all = "camelCase")]
    ContainerStarted { pid: Pid, container_id: String },

    #[serde(rename = "container.stopped")]
    #[serde(rename_all = "camelCase")]
    ContainerStopped { pid: Pid, container_id: String },

    #[serde(rename = "container.removed")]
    #[serde(rename_all = "camelCase")]
    ContainerRemoved { pid: Pid, container_id: String },

    // -- workspace --
    #[serde(rename = "workspace.cleaned")]
    #[serde(rename_all = "camelCase")]
    WorkspaceCleaned { agent_name: String, success: bool },

    // -- tools --
    #[serde(rename = "tools.imported")]
    ToolsImported {
        count: usize,
        format: ToolFormat,
        names: Vec<String>,
    },

    #[serde(rename = "tools.exported")]
    ToolsExported { count: usize, format: ToolFormat },

    // -- reflection --
    #[serde(rename = "reflection.stored")]
    #[serde(rename_all = "camelCase")]
    ReflectionStored {
        id: String,
        agent_uid: String,
        pid: Pid,
        quality_rating: u8,
    },

    // -- system --
    #[serde(rename = "kernel.ready")]
    #[serde(rename_all = "camelCase")]
    KernelReady { version: String, uptime_ms: u64 },

    #[serde(rename = "kernel.metrics")]
    #[serde(rename_all = "camelCase")]
    KernelMetrics {
        process_count: usize,
        cpu_percent: f64,
        #[serde(rename = "memoryMB")]
        memory_mb: f64,
    },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    /// Wire topic string, identical to the serde tag.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::ProcessSpawned { .. } => "process.spawned",
            Event::ProcessStateChange { .. } => "process.stateChange",
            Event::ProcessExit { .. } => "process.exit",
            Event::ApprovalRequired { .. } => "process.approval_required",
            Event::AgentThought { .. } => "agent.thought",
            Event::AgentAction { .. } => "agent.action",
            Event::AgentObservation { .. } => "agent.observation",
            Event::AgentProgress { .. } => "agent.progress",
            Event::AgentApproved { .. } => "agent.approved",
            Event::AgentRejected { .. } => "agent.rejected",
            Event::AgentCompleted { .. } => "agent.completed",
            Event::ResourceUsage { .. } => "resource.usage",
            Event::ResourceExceeded { .. } => "resource.exceeded",
            Event::ContainerCreated { .. } => "container.created",
            Event::ContainerStarted { .. } => "container.started",
            Event::ContainerStopped { .. } => "container.stopped",
            Event::ContainerRemoved { .. } => "container.removed",
            Event::WorkspaceCleaned { .. } => "workspace.cleaned",
            Event::ToolsImported { .. } => "tools.imported",
            Event::ToolsExported { .. } => "tools.exported",
            Event::ReflectionStored { .. } => "reflection.stored",
            Event::KernelReady { .. } => "kernel.ready",
            Event::KernelMetrics { .. } => "kernel.metrics",
            Event::Custom => "custom",
        }
    }

    /// The pid this event concerns, when it concerns one.
    pub fn pid(&self) -> Option<Pid> {
        match self {
            Event::ProcessSpawned { pid, .. }
            | Event::ProcessStateChange { pid, .. }
            | Event::ProcessExit { pid, .. }
            | Event::ApprovalRequired { pid, .. }
            | Event::AgentThought { pid, .. }
            | Event::AgentAction { pid, .. }
            | Event::AgentObservation { pid, .. }
            | Event::AgentProgress { pid, .. }
            | Event::AgentApproved { pid }
            | Event::AgentRejected { pid }
            | Event::AgentCompleted { pid, .. }
            | Event::ResourceUsage { pid, .. }
            | Event::ResourceExceeded { pid, .. }
            | Event::ContainerCreated { pid, .. }
            | Event::ContainerStarted { pid, .. }
            | Event::ContainerStopped { pid, .. }
            | Event::ContainerRemoved { pid, .. }
            | Event::ReflectionStored { pid, .. } => Some(*pid),
            _ => None,
        }
    }

    /// One-line summary for effect/dispatch logging.
    pub fn log_summary(&self) -> String {
        match self {
            Event::ProcessSpawned { pid, info } => {
                format!("{} pid={} uid={}", self.topic(), pid, info.uid)
            }
            Event::ProcessStateChange { pid, state, agent_phase } => match agent_phase {
                Some(phase) => format!("{} pid={} state={} phase={}", self.topic(), pid, state, phase),
                None => format!("{} pid={} state={}", self.topic(), pid, state),
            },
            Event::ProcessExit { pid, code, .. } => {
                format!("{} pid={} code={}", self.topic(), pid, code)
            }
            Event::AgentAction { pid, tool, .. } => {
                format!("{} pid={} tool={}", self.topic(), pid, tool)
            }
            Event::ResourceExceeded { pid, reason, .. } => {
                format!("{} pid={} reason={}", self.topic(), pid, reason)
            }
            other => match other.pid() {
                Some(pid) => format!("{} pid={}", other.topic(), pid),
                None => other.topic().to_string(),
            },
        }
    }
}

/// The unit the bus routes: an event plus its deduplication id.
///
/// Serializes flattened, so the wire shape stays
/// `{"type": "<topic>", ...payload, "eventId": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub event: Event,
    #[serde(rename = "eventId")]
    pub event_id: String,
}

impl Envelope {
    pub fn new(event: Event, event_id: impl Into<String>) -> Self {
        Self { event, event_id: event_id.into() }
    }

    pub fn topic(&self) -> &'static str {
        self.event.topic()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
