// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource quota enforcement and runaway detection.
//!
//! Usage records are created lazily on the first token record. Every
//! record re-checks the quota; crossing any ceiling emits
//! `resource.exceeded` and SIGTERMs the process. A *runaway* (≥ 20% past a
//! ceiling) is reported but not auto-killed — the kill already happened at
//! 100%, so runaway detection only catches metering that raced past the
//! kill.

use crate::bus::EventBus;
use crate::proc::ProcessManager;
use aether_core::{
    AgentUsage, Clock, DayBucket, Event, Pid, QuotaUpdate, ResourceQuota, Signal, UsageSummary,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Provider cost table: (provider substring, input $/M tokens, output $/M).
/// Matched against the lowercased provider label; first match wins, so the
/// more specific entries come first.
const COST_TABLE: &[(&str, f64, f64)] = &[
    ("gemini", 0.075, 0.30),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.0),
    ("claude-haiku", 0.80, 4.0),
    ("claude", 3.0, 15.0),
];

/// Fallback (input $/M, output $/M) for unknown providers.
const COST_FALLBACK: (f64, f64) = (1.0, 3.0);

/// A runaway is usage at or past this fraction of any ceiling.
const RUNAWAY_FACTOR: f64 = 1.2;

/// Result of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl QuotaCheck {
    fn ok() -> Self {
        Self { allowed: true, reason: None }
    }

    fn exceeded(reason: String) -> Self {
        Self { allowed: false, reason: Some(reason) }
    }
}

struct GovEntry {
    usage: AgentUsage,
    /// Today's token bucket; older days are evicted on record.
    daily: Vec<DayBucket>,
    quota_override: Option<QuotaUpdate>,
}

impl GovEntry {
    fn new(started_at_ms: u64) -> Self {
        Self { usage: AgentUsage::new(started_at_ms), daily: Vec::new(), quota_override: None }
    }

    fn daily_tokens(&self, today: u32) -> u64 {
        self.daily.iter().filter(|bucket| bucket.day == today).map(|bucket| bucket.tokens).sum()
    }
}

/// Owner of the usage map and per-pid quota overrides.
pub struct ResourceGovernor<C: Clock> {
    bus: EventBus<C>,
    clock: C,
    defaults: ResourceQuota,
    processes: Arc<ProcessManager<C>>,
    state: Mutex<HashMap<Pid, GovEntry>>,
}

impl<C: Clock> ResourceGovernor<C> {
    pub fn new(
        bus: EventBus<C>,
        clock: C,
        defaults: ResourceQuota,
        processes: Arc<ProcessManager<C>>,
    ) -> Self {
        Self { bus, clock, defaults, processes, state: Mutex::new(HashMap::new()) }
    }

    /// Record one LLM exchange. Emits `resource.usage`, then enforces the
    /// quota (emitting `resource.exceeded` and SIGTERMing on violation).
    pub fn record_token_usage(&self, pid: Pid, input: u64, output: u64, provider: &str) {
        let today = self.clock.epoch_day();
        let usage = {
            let mut state = self.state.lock();
            let entry = state
                .entry(pid)
                .or_insert_with(|| GovEntry::new(self.clock.epoch_ms()));

            entry.usage.total_input_tokens += input;
            entry.usage.total_output_tokens += output;
            entry.usage.estimated_cost_usd += estimate_cost(input, output, provider);
            entry.usage.provider = provider.to_string();

            // Explicit daily-window eviction: drop buckets from other days,
            // then accumulate into today's.
            entry.daily.retain(|bucket| bucket.day == today);
            match entry.daily.iter_mut().find(|bucket| bucket.day == today) {
                Some(bucket) => bucket.tokens += input + output,
                None => entry.daily.push(DayBucket { day: today, tokens: input + output }),
            }

            entry.usage.clone()
        };

        self.bus.emit(Event::ResourceUsage { pid, usage });
        self.enforce(pid);
    }

    /// Count one loop step against the step ceiling.
    pub fn record_step(&self, pid: Pid) {
        {
            let mut state = self.state.lock();
            let entry = state
                .entry(pid)
                .or_insert_with(|| GovEntry::new(self.clock.epoch_ms()));
            entry.usage.total_steps += 1;
        }
        self.enforce(pid);
    }

    fn enforce(&self, pid: Pid) {
        let check = self.check_quota(pid);
        if check.allowed {
            return;
        }
        let reason = check.reason.unwrap_or_else(|| "quota exceeded".to_string());
        let usage = self.usage(pid).unwrap_or_else(|| AgentUsage::new(self.clock.epoch_ms()));
        tracing::warn!(%pid, %reason, "resource quota exceeded, terminating");
        self.bus.emit(Event::ResourceExceeded { pid, reason, usage });
        if let Err(e) = self.processes.signal(pid, Signal::Term) {
            tracing::warn!(%pid, error = %e, "failed to deliver SIGTERM for quota violation");
        }
    }

    /// Check all four ceilings; first violation wins.
    pub fn check_quota(&self, pid: Pid) -> QuotaCheck {
        let quota = self.quota(pid);
        let today = self.clock.epoch_day();
        let now_ms = self.clock.epoch_ms();

        let state = self.state.lock();
        let Some(entry) = state.get(&pid) else {
            return QuotaCheck::ok();
        };

        let session = entry.usage.session_tokens();
        if session > quota.max_tokens_per_session {
            return QuotaCheck::exceeded(format!(
                "Session token limit exceeded: {}/{}",
                session, quota.max_tokens_per_session
            ));
        }

        let daily = entry.daily_tokens(today);
        if daily > quota.max_tokens_per_day {
            return QuotaCheck::exceeded(format!(
                "Daily token limit exceeded: {}/{}",
                daily, quota.max_tokens_per_day
            ));
        }

        if entry.usage.total_steps > quota.max_steps {
            return QuotaCheck::exceeded(format!(
                "Step limit exceeded: {}/{}",
                entry.usage.total_steps, quota.max_steps
            ));
        }

        let elapsed = now_ms.saturating_sub(entry.usage.started_at_ms);
        if elapsed > quota.max_wall_clock_ms {
            return QuotaCheck::exceeded(format!(
                "Wall clock limit exceeded: {}ms/{}ms",
                elapsed, quota.max_wall_clock_ms
            ));
        }

        QuotaCheck::ok()
    }

    /// Any ceiling exceeded by ≥ 20%. Reported, never auto-killed here.
    pub fn is_runaway(&self, pid: Pid) -> bool {
        let quota = self.quota(pid);
        let today = self.clock.epoch_day();
        let now_ms = self.clock.epoch_ms();

        let state = self.state.lock();
        let Some(entry) = state.get(&pid) else {
            return false;
        };

        let past = |value: f64, ceiling: u64| value >= ceiling as f64 * RUNAWAY_FACTOR;
        past(entry.usage.session_tokens() as f64, quota.max_tokens_per_session)
            || past(entry.daily_tokens(today) as f64, quota.max_tokens_per_day)
            || past(entry.usage.total_steps as f64, quota.max_steps as u64)
            || past(
                now_ms.saturating_sub(entry.usage.started_at_ms) as f64,
                quota.max_wall_clock_ms,
            )
    }

    /// Effective quota for a pid: defaults merged with any override.
    pub fn quota(&self, pid: Pid) -> ResourceQuota {
        let state = self.state.lock();
        match state.get(&pid).and_then(|entry| entry.quota_override) {
            Some(update) => self.defaults.merged(update),
            None => self.defaults,
        }
    }

    /// Set a partial per-pid override.
    pub fn set_quota(&self, pid: Pid, update: QuotaUpdate) {
        let mut state = self.state.lock();
        let entry = state
            .entry(pid)
            .or_insert_with(|| GovEntry::new(self.clock.epoch_ms()));
        entry.quota_override = Some(match entry.quota_override {
            Some(existing) => merge_updates(existing, update),
            None => update,
        });
    }

    pub fn usage(&self, pid: Pid) -> Option<AgentUsage> {
        self.state.lock().get(&pid).map(|entry| entry.usage.clone())
    }

    /// Kernel-wide rollup.
    pub fn summary(&self) -> UsageSummary {
        let state = self.state.lock();
        let mut summary = UsageSummary { process_count: state.len(), ..Default::default() };
        let mut pids: Vec<_> = state.keys().copied().collect();
        pids.sort();
        summary.pids = pids;
        for entry in state.values() {
            summary.total_input_tokens += entry.usage.total_input_tokens;
            summary.total_output_tokens += entry.usage.total_output_tokens;
            summary.total_steps += entry.usage.total_steps as u64;
            summary.estimated_cost_usd += entry.usage.estimated_cost_usd;
        }
        summary
    }

    /// Drop the usage record and daily counters. Idempotent.
    pub fn cleanup(&self, pid: Pid) {
        self.state.lock().remove(&pid);
    }

    /// Estimated USD cost of one exchange for a provider.
    pub fn estimate_cost(&self, input: u64, output: u64, provider: &str) -> f64 {
        estimate_cost(input, output, provider)
    }
}

fn merge_updates(base: QuotaUpdate, update: QuotaUpdate) -> QuotaUpdate {
    QuotaUpdate {
        max_tokens_per_session: update.max_tokens_per_session.or(base.max_tokens_per_session),
        max_tokens_per_day: update.max_tokens_per_day.or(base.max_tokens_per_day),
        max_steps: update.max_steps.or(base.max_steps),
        max_wall_clock_ms: update.max_wall_clock_ms.or(base.max_wall_clock_ms),
    }
}

/// Estimated USD cost of one exchange, from the provider table.
pub fn estimate_cost(input: u64, output: u64, provider: &str) -> f64 {
    let provider = provider.to_lowercase();
    let (input_rate, output_rate) = COST_TABLE
        .iter()
        .find(|(needle, _, _)| provider.contains(needle))
        .map(|(_, input_rate, output_rate)| (*input_rate, *output_rate))
        .unwrap_or(COST_FALLBACK);
    input as f64 / 1_000_000.0 * input_rate + output as f64 / 1_000_000.0 * output_rate
}

#[cfg(test)]
#[path = "govern_tests.rs"]
mod tests;
