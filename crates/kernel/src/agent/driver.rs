// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The think–act–observe driver.
//!
//! One driver task per agent process, bounded by the step ceiling and the
//! process cancellation token. Every per-step failure is recorded as an
//! observation and the loop continues; the only exits are cancellation,
//! the step cap, the `complete` tool, and external termination.

use crate::agent::oracle::{ChatEntry, ChatRole, HeuristicOracle, Oracle};
use crate::agent::tools::{ToolContext, ToolRegistry};
use crate::bus::EventBus;
use crate::govern::ResourceGovernor;
use crate::metrics::MetricsExporter;
use crate::proc::ProcessManager;
use aether_core::{
    AgentPhase, Clock, Event, KernelConfig, Pid, ProcessState,
};
use std::sync::Arc;
use std::time::Duration;

/// How far a result string travels in an `agent.observation` payload.
const OBSERVATION_LIMIT: usize = 500;

/// How far a result line travels in the rolling history.
const HISTORY_LIMIT: usize = 1000;

/// Poll interval while a process sits in *stopped*/*paused*.
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Driver knobs, defaulted from the kernel configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub inter_step: Duration,
    pub approval_timeout: Duration,
    /// Entries of rolling history handed to the oracle.
    pub history_window: usize,
    /// Provider label used for LLM latency metrics.
    pub provider_label: String,
}

impl DriverConfig {
    pub fn from_kernel(config: &KernelConfig) -> Self {
        Self {
            inter_step: config.inter_step_interval,
            approval_timeout: config.approval_timeout,
            history_window: 20,
            provider_label: "heuristic".to_string(),
        }
    }
}

enum Outcome {
    Completed,
    MaxSteps,
    Cancelled,
}

enum ApprovalOutcome {
    Approved,
    Rejected,
    TimedOut,
    Cancelled,
}

/// Drives one agent loop per [`run`](AgentDriver::run) call.
pub struct AgentDriver<C: Clock> {
    bus: EventBus<C>,
    processes: Arc<ProcessManager<C>>,
    governor: Arc<ResourceGovernor<C>>,
    registry: Arc<ToolRegistry>,
    oracle: Arc<dyn Oracle>,
    metrics: Option<Arc<MetricsExporter<C>>>,
    clock: C,
    config: DriverConfig,
}

impl<C: Clock> AgentDriver<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: EventBus<C>,
        processes: Arc<ProcessManager<C>>,
        governor: Arc<ResourceGovernor<C>>,
        registry: Arc<ToolRegistry>,
        oracle: Arc<dyn Oracle>,
        metrics: Option<Arc<MetricsExporter<C>>>,
        clock: C,
        config: DriverConfig,
    ) -> Self {
        Self { bus, processes, governor, registry, oracle, metrics, clock, config }
    }

    /// Run the loop for `pid` until a terminal condition. Infallible from
    /// the caller's perspective; all failures are folded into the loop.
    pub async fn run(&self, pid: Pid) {
        let Some(info) = self.processes.get(pid) else {
            return;
        };
        let Some(cancel) = self.processes.cancel_token(pid) else {
            return;
        };

        let goal = info.goal.clone();
        let max_steps = self.governor.quota(pid).max_steps;
        let specs = self.registry.specs();
        let started = self.clock.now();
        let started_ms = self.clock.epoch_ms();

        let mut history = vec![ChatEntry::new(
            ChatRole::System,
            format!("You are a {} agent. Goal: {}", info.role, goal),
            started_ms,
        )];

        // Freshly spawned processes start running; anything else (already
        // stopped, signalled) keeps its state and the loop reacts to it.
        if info.state == ProcessState::Created
            && self
                .processes
                .set_state(pid, ProcessState::Running, Some(AgentPhase::Idle))
                .is_err()
        {
            return;
        }

        let mut step: u32 = 0;
        let outcome = loop {
            // Cancellation first: a SIGTERM/SIGKILL or kernel shutdown ends
            // the loop at the next checkpoint.
            if cancel.is_cancelled() {
                break Outcome::Cancelled;
            }
            let Some(current) = self.processes.get(pid) else {
                break Outcome::Cancelled;
            };
            if current.state.is_terminal() {
                break Outcome::Cancelled;
            }

            // Cooperative pause: wait out stopped/paused states.
            if matches!(current.state, ProcessState::Stopped | ProcessState::Paused) {
                tokio::select! {
                    _ = cancel.cancelled() => break Outcome::Cancelled,
                    _ = tokio::time::sleep(PAUSE_POLL) => continue,
                }
            }

            if step >= max_steps {
                self.bus.emit(Event::AgentThought {
                    pid,
                    thought: format!(
                        "Reached the step limit ({max_steps}) before completing the goal; stopping."
                    ),
                });
                break Outcome::MaxSteps;
            }

            // Think.
            let _ = self.processes.set_state(pid, ProcessState::Running, Some(AgentPhase::Thinking));
            let think_started = self.clock.now();
            let decision = match self.oracle.decide(window(&history, self.config.history_window), &specs).await
            {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(%pid, error = %e, "oracle failed, using heuristic fallback");
                    HeuristicOracle::fallback(step, &goal, &specs)
                }
            };
            if let Some(metrics) = &self.metrics {
                let elapsed = self.clock.now().duration_since(think_started);
                metrics.observe_llm_latency(&self.config.provider_label, elapsed.as_secs_f64());
            }

            self.bus.emit(Event::AgentThought { pid, thought: decision.reasoning.clone() });
            history.push(ChatEntry::new(
                ChatRole::Agent,
                decision.reasoning.clone(),
                self.clock.epoch_ms(),
            ));

            // Dispatch.
            let Some(tool) = self.registry.lookup(&decision.tool) else {
                let note = format!("Unknown tool: {}", decision.tool);
                self.observe(pid, &mut history, &note);
                step = self.advance(pid, step, &cancel).await;
                continue;
            };

            // Approval gate.
            if tool.spec().requires_approval {
                let _ = self.processes.set_state(pid, ProcessState::Sleeping, Some(AgentPhase::Waiting));
                self.bus.emit(Event::ApprovalRequired {
                    pid,
                    action: decision.tool.clone(),
                    details: decision.args.clone(),
                });

                match self.wait_approval(pid, &cancel).await {
                    ApprovalOutcome::Approved => {
                        let _ = self.processes.set_state(pid, ProcessState::Running, None);
                    }
                    ApprovalOutcome::Rejected | ApprovalOutcome::TimedOut => {
                        let note = format!("Approval denied for {}", decision.tool);
                        let _ = self.processes.set_state(pid, ProcessState::Running, Some(AgentPhase::Idle));
                        self.observe(pid, &mut history, &note);
                        step = self.advance(pid, step, &cancel).await;
                        continue;
                    }
                    ApprovalOutcome::Cancelled => break Outcome::Cancelled,
                }
            }

            // Act.
            let _ = self.processes.set_state(pid, ProcessState::Running, Some(AgentPhase::Executing));
            self.bus.emit(Event::AgentAction {
                pid,
                tool: decision.tool.clone(),
                args: decision.args.clone(),
            });

            let ctx = ToolContext {
                pid,
                uid: info.uid,
                goal: goal.clone(),
                workspace: info.cwd.clone(),
                now_ms: self.clock.epoch_ms(),
            };
            let result = match tool.execute(&ctx, &decision.args).await {
                Ok(output) => output,
                Err(e) => format!("Error: {e}"),
            };

            // Observe.
            let _ = self.processes.set_state(pid, ProcessState::Running, Some(AgentPhase::Observing));
            self.observe(pid, &mut history, &result);

            // Completion.
            if decision.tool == "complete" {
                self.bus.emit(Event::AgentProgress {
                    pid,
                    step,
                    max_steps,
                    summary: truncated(&result, OBSERVATION_LIMIT),
                });
                break Outcome::Completed;
            }

            // Rate limit.
            step = self.advance(pid, step, &cancel).await;
        };

        let duration_ms = self.clock.now().duration_since(started).as_millis() as u64;
        match outcome {
            Outcome::Completed => {
                let _ = self.processes.exit(pid, 0);
                tracing::info!(%pid, steps = step + 1, "agent completed");
                self.bus.emit(Event::AgentCompleted {
                    pid,
                    outcome: "completed".to_string(),
                    steps: step + 1,
                    duration_ms,
                });
            }
            Outcome::MaxSteps => {
                let _ = self.processes.exit(pid, 0);
                tracing::info!(%pid, steps = step, "agent hit the step cap");
                self.bus.emit(Event::AgentCompleted {
                    pid,
                    outcome: "completed".to_string(),
                    steps: step,
                    duration_ms,
                });
            }
            Outcome::Cancelled => {
                // 128 + SIGINT, the conventional interrupted-exit code.
                let _ = self.processes.exit(pid, 130);
                tracing::info!(%pid, steps = step, "agent cancelled");
                self.bus.emit(Event::AgentCompleted {
                    pid,
                    outcome: "cancelled".to_string(),
                    steps: step,
                    duration_ms,
                });
            }
        }
    }

    /// Emit the observation and append the history line, both truncated.
    fn observe(&self, pid: Pid, history: &mut Vec<ChatEntry>, result: &str) {
        self.bus.emit(Event::AgentObservation {
            pid,
            result: truncated(result, OBSERVATION_LIMIT),
        });
        history.push(ChatEntry::new(
            ChatRole::Tool,
            truncated(result, HISTORY_LIMIT),
            self.clock.epoch_ms(),
        ));
    }

    /// Count the step with the governor, then sleep the inter-step
    /// interval (or return early on cancellation).
    async fn advance(&self, pid: Pid, step: u32, cancel: &tokio_util::sync::CancellationToken) -> u32 {
        self.governor.record_step(pid);
        if self.config.inter_step.is_zero() {
            // Keep the loop cooperative even without a rate limit.
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.config.inter_step) => {}
            }
        }
        step + 1
    }

    /// Wait for any of approved / rejected / cancel / timeout.
    async fn wait_approval(
        &self,
        pid: Pid,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> ApprovalOutcome {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<bool>(2);

        let approved_sub = {
            let tx = tx.clone();
            self.bus.subscribe("agent.approved", move |envelope| {
                if envelope.event.pid() == Some(pid) {
                    let _ = tx.try_send(true);
                }
                Ok(())
            })
        };
        let rejected_sub = {
            let tx = tx.clone();
            self.bus.subscribe("agent.rejected", move |envelope| {
                if envelope.event.pid() == Some(pid) {
                    let _ = tx.try_send(false);
                }
                Ok(())
            })
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => ApprovalOutcome::Cancelled,
            answer = rx.recv() => match answer {
                Some(true) => ApprovalOutcome::Approved,
                Some(false) => ApprovalOutcome::Rejected,
                None => ApprovalOutcome::Cancelled,
            },
            _ = tokio::time::sleep(self.config.approval_timeout) => ApprovalOutcome::TimedOut,
        };

        self.bus.unsubscribe(approved_sub);
        self.bus.unsubscribe(rejected_sub);
        outcome
    }
}

fn window(history: &[ChatEntry], n: usize) -> &[ChatEntry] {
    &history[history.len().saturating_sub(n)..]
}

fn truncated(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        s.to_string()
    } else {
        let mut end = limit;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
