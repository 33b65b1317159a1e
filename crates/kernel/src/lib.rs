// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aether-kernel: the supervision kernel.
//!
//! Runs many LLM-driven agent processes side by side on one host: a typed
//! synchronous event bus, a PID table with a Unix-like signal machine,
//! per-agent resource quotas with runaway kill, opportunistic Docker
//! sandboxes, an audit trail, Prometheus metrics, and the SSE event stream
//! boundary. [`kernel::Kernel::boot`] wires everything together.

pub mod agent;
pub mod audit;
pub mod bus;
pub mod compat;
pub mod govern;
pub mod kernel;
pub mod metrics;
pub mod proc;
pub mod router;
pub mod sandbox;
pub mod stream;

pub use agent::{
    AgentDriver, ChatEntry, ChatRole, Decision, DriverConfig, HeuristicOracle, Oracle,
    OracleError, ScriptedOracle, ToolRegistry,
};
pub use audit::AuditLogger;
pub use bus::{BusError, EventBus, HandlerError, SubscriberId};
pub use compat::{CompatError, ToolCompatLayer};
pub use govern::{QuotaCheck, ResourceGovernor};
pub use kernel::{BootError, Kernel};
pub use metrics::{MetricsExporter, MetricsRegistry};
pub use proc::{ProcessError, ProcessManager};
pub use router::ModelRouter;
pub use sandbox::{ContainerManager, ExecOptions, SandboxError, WorkspaceManager};
pub use stream::{EventStream, StreamError};
