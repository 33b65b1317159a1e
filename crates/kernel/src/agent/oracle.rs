// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The LLM oracle seam.
//!
//! The kernel treats the model as a black box that, given the rolling
//! conversation and the tool catalog, names the next tool to call. Any
//! failure is catchable: the driver falls back to a deterministic heuristic
//! so an agent loop never deadlocks on a broken provider.

use aether_core::{ErrorCode, ToolSpec};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Who said a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Agent,
    Tool,
}

/// One entry of the rolling conversation handed to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    pub timestamp_ms: u64,
}

impl ChatEntry {
    pub fn new(role: ChatRole, content: impl Into<String>, timestamp_ms: u64) -> Self {
        Self { role, content: content.into(), timestamp_ms }
    }
}

/// The oracle's next-action decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub reasoning: String,
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Transport(String),
    #[error("oracle returned a malformed decision: {0}")]
    Malformed(String),
    #[error("oracle timed out")]
    Timeout,
    #[error("oracle does not support this operation: {0}")]
    Unsupported(&'static str),
}

impl OracleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OracleError::Transport(_) => ErrorCode::Transport,
            OracleError::Timeout => ErrorCode::Timeout,
            OracleError::Malformed(_) | OracleError::Unsupported(_) => ErrorCode::ExecutionError,
        }
    }
}

/// External LLM viewed as a next-action decider.
#[async_trait]
pub trait Oracle: Send + Sync + 'static {
    /// Choose the next tool given the rolling history and catalog.
    async fn decide(
        &self,
        history: &[ChatEntry],
        tools: &[ToolSpec],
    ) -> Result<Decision, OracleError>;

    /// Vision variant: describe a base64 image under a prompt.
    async fn describe_image(
        &self,
        _image_base64: &str,
        _prompt: &str,
    ) -> Result<String, OracleError> {
        Err(OracleError::Unsupported("vision"))
    }

    /// Whether the provider returns tool calls in-band; when false the
    /// driver parses the decision out of plain completions.
    fn supports_native_tools(&self) -> bool {
        false
    }
}

/// Deterministic fallback used when the oracle fails, and the default
/// oracle for kernels booted without a provider: think once about the
/// goal, then complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicOracle;

impl HeuristicOracle {
    /// The fallback decision for a given step. Pure and total.
    pub fn fallback(step: u32, goal: &str, tools: &[ToolSpec]) -> Decision {
        let has = |name: &str| tools.iter().any(|tool| tool.name == name);
        if step == 0 && has("think") {
            return Decision {
                reasoning: format!("Starting work on the goal: {goal}"),
                tool: "think".to_string(),
                args: serde_json::json!({ "thought": format!("Break down the goal: {goal}") }),
            };
        }
        Decision {
            reasoning: "No oracle guidance available; wrapping up.".to_string(),
            tool: "complete".to_string(),
            args: serde_json::json!({ "summary": format!("Stopped after step {step}: {goal}") }),
        }
    }
}

#[async_trait]
impl Oracle for HeuristicOracle {
    async fn decide(
        &self,
        history: &[ChatEntry],
        tools: &[ToolSpec],
    ) -> Result<Decision, OracleError> {
        let goal = history
            .iter()
            .find(|entry| entry.role == ChatRole::System)
            .map(|entry| entry.content.as_str())
            .unwrap_or("");
        // History grows by roughly two entries per step (thought + result).
        let step = (history.len().saturating_sub(1) / 2) as u32;
        Ok(Self::fallback(step, goal, tools))
    }
}

/// Plays back a fixed list of decisions, then completes. Deterministic
/// oracle for tests and dry runs.
pub struct ScriptedOracle {
    script: Mutex<std::vec::IntoIter<Decision>>,
    /// When set, `decide` fails with a transport error instead (for
    /// exercising the fallback path).
    failing: bool,
}

impl ScriptedOracle {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self { script: Mutex::new(decisions.into_iter()), failing: false }
    }

    /// An oracle whose every call fails.
    pub fn failing() -> Self {
        Self { script: Mutex::new(Vec::new().into_iter()), failing: true }
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn decide(
        &self,
        _history: &[ChatEntry],
        _tools: &[ToolSpec],
    ) -> Result<Decision, OracleError> {
        if self.failing {
            return Err(OracleError::Transport("scripted failure".to_string()));
        }
        Ok(self.script.lock().next().unwrap_or_else(|| Decision {
            reasoning: "Script exhausted; completing.".to_string(),
            tool: "complete".to_string(),
            args: serde_json::json!({ "summary": "script finished" }),
        }))
    }
}

#[cfg(test)]
#[path = "oracle_tests.rs"]
mod tests;
