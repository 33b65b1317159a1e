// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus-driven metrics collection.
//!
//! Counters increment as events flow; gauges are refreshed from kernel
//! state at render time; latency histograms are fed by the driver (LLM)
//! and by action/observation event pairing (tools).

use super::{MetricsRegistry, ValueFormat};
use crate::bus::{EventBus, SubscriberId};
use crate::proc::ProcessManager;
use aether_core::{Clock, Event, Pid, WILDCARD_TOPIC};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Last cumulative usage seen per pid, for deriving per-record deltas.
#[derive(Default, Clone, Copy)]
struct UsageWatermark {
    input: u64,
    output: u64,
    cost: f64,
}

pub struct MetricsExporter<C: Clock> {
    bus: EventBus<C>,
    clock: C,
    registry: Arc<MetricsRegistry>,
    processes: Arc<ProcessManager<C>>,
    /// Live SSE/WebSocket consumer count, owned by the stream boundary.
    connections: Arc<AtomicUsize>,
    usage_watermarks: Mutex<HashMap<Pid, UsageWatermark>>,
    /// In-flight tool call per pid: (tool name, start instant).
    pending_actions: Mutex<HashMap<Pid, (String, Instant)>>,
    subscriptions: Mutex<Vec<SubscriberId>>,
    shut_down: AtomicBool,
}

impl<C: Clock> MetricsExporter<C> {
    pub fn new(
        bus: EventBus<C>,
        clock: C,
        registry: Arc<MetricsRegistry>,
        processes: Arc<ProcessManager<C>>,
        connections: Arc<AtomicUsize>,
    ) -> Arc<Self> {
        register_families(&registry);
        let exporter = Arc::new(Self {
            bus,
            clock,
            registry,
            processes,
            connections,
            usage_watermarks: Mutex::new(HashMap::new()),
            pending_actions: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        });
        exporter.subscribe_all();
        exporter
    }

    fn subscribe_all(self: &Arc<Self>) {
        let mut subs = self.subscriptions.lock();

        {
            let this = Arc::clone(self);
            subs.push(self.bus.subscribe(WILDCARD_TOPIC, move |envelope| {
                this.registry.inc_counter(
                    "aether_events_emitted_total",
                    vec![("event_type", envelope.topic().to_string())],
                    1.0,
                );
                Ok(())
            }));
        }
        {
            let this = Arc::clone(self);
            subs.push(self.bus.subscribe("process.spawned", move |_| {
                this.registry.inc_counter("aether_agents_total", vec![], 1.0);
                Ok(())
            }));
        }
        {
            let this = Arc::clone(self);
            subs.push(self.bus.subscribe("agent.action", move |envelope| {
                if let Event::AgentAction { pid, tool, .. } = &envelope.event {
                    this.registry.inc_counter(
                        "aether_tool_executions_total",
                        vec![("tool_name", tool.clone())],
                        1.0,
                    );
                    this.pending_actions
                        .lock()
                        .insert(*pid, (tool.clone(), this.clock.now()));
                }
                Ok(())
            }));
        }
        {
            let this = Arc::clone(self);
            subs.push(self.bus.subscribe("agent.observation", move |envelope| {
                if let Event::AgentObservation { pid, .. } = &envelope.event {
                    if let Some((tool, started)) = this.pending_actions.lock().remove(pid) {
                        let elapsed = this.clock.now().duration_since(started).as_secs_f64();
                        this.registry.observe(
                            "aether_tool_latency_seconds",
                            vec![("tool_name", tool)],
                            elapsed,
                        );
                    }
                    let role = this
                        .processes
                        .get(*pid)
                        .map(|info| info.role)
                        .unwrap_or_default();
                    this.registry.inc_counter(
                        "aether_agent_steps_total",
                        vec![("pid", pid.to_string()), ("role", role)],
                        1.0,
                    );
                }
                Ok(())
            }));
        }
        {
            let this = Arc::clone(self);
            subs.push(self.bus.subscribe("agent.completed", move |envelope| {
                if let Event::AgentCompleted { pid, outcome, duration_ms, .. } = &envelope.event {
                    this.registry.inc_counter(
                        "aether_agent_completions_total",
                        vec![("outcome", outcome.clone())],
                        1.0,
                    );
                    this.registry.observe(
                        "aether_agent_duration_seconds",
                        vec![("outcome", outcome.clone())],
                        *duration_ms as f64 / 1000.0,
                    );
                    this.pending_actions.lock().remove(pid);
                }
                Ok(())
            }));
        }
        {
            let this = Arc::clone(self);
            subs.push(self.bus.subscribe("resource.usage", move |envelope| {
                if let Event::ResourceUsage { pid, usage } = &envelope.event {
                    let (input_delta, output_delta, cost_delta) = {
                        let mut watermarks = this.usage_watermarks.lock();
                        let mark = watermarks.entry(*pid).or_default();
                        let deltas = (
                            usage.total_input_tokens.saturating_sub(mark.input),
                            usage.total_output_tokens.saturating_sub(mark.output),
                            (usage.estimated_cost_usd - mark.cost).max(0.0),
                        );
                        *mark = UsageWatermark {
                            input: usage.total_input_tokens,
                            output: usage.total_output_tokens,
                            cost: usage.estimated_cost_usd,
                        };
                        deltas
                    };

                    let provider = usage.provider.clone();
                    this.registry.inc_counter(
                        "aether_llm_requests_total",
                        vec![("provider", provider.clone()), ("model", provider.clone())],
                        1.0,
                    );
                    this.registry.inc_counter(
                        "aether_llm_tokens_total",
                        vec![("provider", provider.clone()), ("direction", "input".to_string())],
                        input_delta as f64,
                    );
                    this.registry.inc_counter(
                        "aether_llm_tokens_total",
                        vec![("provider", provider.clone()), ("direction", "output".to_string())],
                        output_delta as f64,
                    );
                    this.registry.inc_counter(
                        "aether_cost_usd_total",
                        vec![("provider", provider)],
                        cost_delta,
                    );
                }
                Ok(())
            }));
        }
    }

    /// Observe one oracle round-trip latency.
    pub fn observe_llm_latency(&self, provider: &str, seconds: f64) {
        self.registry.observe(
            "aether_llm_latency_seconds",
            vec![("provider", provider.to_string())],
            seconds,
        );
    }

    /// Refresh gauges from live state, then render the exposition.
    pub fn render(&self) -> String {
        self.registry.set_gauge("aether_agents_active", self.processes.active_count() as f64);
        self.registry.set_gauge(
            "aether_websocket_connections",
            self.connections.load(Ordering::SeqCst) as f64,
        );
        self.registry.render()
    }

    /// Unsubscribe every handler. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        for id in self.subscriptions.lock().drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

fn register_families(registry: &MetricsRegistry) {
    registry.register_gauge("aether_agents_active", "Agent processes not yet terminal");
    registry.register_gauge("aether_websocket_connections", "Connected event stream consumers");

    registry.register_counter("aether_agents_total", "Agent processes spawned", ValueFormat::Auto);
    registry.register_counter(
        "aether_agent_completions_total",
        "Agent loop completions by outcome",
        ValueFormat::Auto,
    );
    registry.register_counter(
        "aether_agent_steps_total",
        "Agent loop steps taken",
        ValueFormat::Auto,
    );
    registry.register_counter(
        "aether_llm_requests_total",
        "LLM requests recorded",
        ValueFormat::Auto,
    );
    registry.register_counter(
        "aether_llm_tokens_total",
        "LLM tokens recorded by direction",
        ValueFormat::Auto,
    );
    registry.register_counter(
        "aether_tool_executions_total",
        "Tool calls dispatched",
        ValueFormat::Auto,
    );
    registry.register_counter(
        "aether_events_emitted_total",
        "Bus events emitted by type",
        ValueFormat::Auto,
    );
    registry.register_counter(
        "aether_cost_usd_total",
        "Estimated LLM spend in USD",
        ValueFormat::Fixed6,
    );

    registry.register_histogram("aether_agent_duration_seconds", "Agent run duration");
    registry.register_histogram("aether_llm_latency_seconds", "Oracle round-trip latency");
    registry.register_histogram("aether_tool_latency_seconds", "Tool execution latency");
}

#[cfg(test)]
#[path = "exporter_tests.rs"]
mod tests;
