// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource quota ceilings and per-process usage accounting.

use crate::process::Pid;
use serde::{Deserialize, Serialize};

/// Four independent ceilings enforced by the ResourceGovernor.
///
/// The kernel-wide defaults come from configuration; per-pid overrides are
/// layered on top with [`QuotaUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuota {
    /// Input + output tokens allowed for one process lifetime.
    pub max_tokens_per_session: u64,
    /// Input + output tokens allowed inside a rolling 24-hour window.
    pub max_tokens_per_day: u64,
    pub max_steps: u32,
    pub max_wall_clock_ms: u64,
}

impl Default for ResourceQuota {
    fn default() -> Self {
        Self {
            max_tokens_per_session: 500_000,
            max_tokens_per_day: 2_000_000,
            max_steps: 200,
            max_wall_clock_ms: 3_600_000,
        }
    }
}

/// Partial quota override; `None` fields keep the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens_per_session: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens_per_day: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wall_clock_ms: Option<u64>,
}

impl ResourceQuota {
    /// Apply a partial override, returning the merged quota.
    pub fn merged(self, update: QuotaUpdate) -> Self {
        Self {
            max_tokens_per_session: update
                .max_tokens_per_session
                .unwrap_or(self.max_tokens_per_session),
            max_tokens_per_day: update.max_tokens_per_day.unwrap_or(self.max_tokens_per_day),
            max_steps: update.max_steps.unwrap_or(self.max_steps),
            max_wall_clock_ms: update.max_wall_clock_ms.unwrap_or(self.max_wall_clock_ms),
        }
    }
}

/// Token bucket for one epoch day; the governor keeps a short ring of these
/// per pid so the rolling daily window evicts old days explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    pub day: u32,
    pub tokens: u64,
}

/// Cumulative usage for one process, lazily created on first token record.
///
/// Monotonically non-decreasing while the process lives; cleared on reap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUsage {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_steps: u32,
    pub started_at_ms: u64,
    pub estimated_cost_usd: f64,
    /// Provider label from the last record (e.g. "gemini-2.0-flash").
    pub provider: String,
}

impl AgentUsage {
    pub fn new(started_at_ms: u64) -> Self {
        Self {
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_steps: 0,
            started_at_ms,
            estimated_cost_usd: 0.0,
            provider: String::new(),
        }
    }

    /// Session token total (input + output).
    pub fn session_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }
}

/// Kernel-wide usage rollup for `getSummary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub process_count: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_steps: u64,
    pub estimated_cost_usd: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pids: Vec<Pid>,
}

#[cfg(test)]
#[path = "quota_tests.rs"]
mod tests;
