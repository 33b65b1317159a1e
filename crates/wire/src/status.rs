// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Summary DTOs for dashboards and operator tooling.

use aether_core::{
    AgentPhase, AgentUsage, ContainerInfo, Pid, ProcessCounts, ProcessState,
};
use serde::{Deserialize, Serialize};

/// One row of the process table as shown to external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    pub pid: Pid,
    pub uid: String,
    pub role: String,
    pub goal: String,
    pub state: ProcessState,
    pub agent_phase: AgentPhase,
    pub created_at_ms: u64,
}

/// Usage rollup for one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEntry {
    pub pid: Pid,
    #[serde(flatten)]
    pub usage: AgentUsage,
}

/// Kernel status summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelStatus {
    pub version: String,
    pub uptime_ms: u64,
    pub counts: ProcessCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ContainerInfo>,
    pub sandbox_available: bool,
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
