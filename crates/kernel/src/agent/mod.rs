// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent side of the kernel: the oracle seam, the native tool
//! registry, and the think–act–observe driver.

mod driver;
mod oracle;
mod tools;

pub use driver::{AgentDriver, DriverConfig};
pub use oracle::{
    ChatEntry, ChatRole, Decision, HeuristicOracle, Oracle, OracleError, ScriptedOracle,
};
pub use tools::{
    native_registry, CommandRunner, HostCommandRunner, SandboxCommandRunner, ToolContext,
    ToolError, ToolHandler, ToolRegistry,
};
