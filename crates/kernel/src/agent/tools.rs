// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The native tool catalog and its execution seam.
//!
//! Tools are the only side effects an agent can request. Each handler gets
//! a [`ToolContext`] scoped to the requesting process; file tools are
//! jailed to the process workspace, and `run_command` routes through the
//! sandbox when the process has a container.

use crate::bus::EventBus;
use crate::sandbox::{run_with_timeout, ContainerManager, ExecOptions};
use aether_core::{
    AgentUid, Clock, ErrorCode, Event, Pid, ReflectionRecord, ToolSpec,
};
use aether_storage::StateStore;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Cap on bytes a file_read observation can pull into history.
const FILE_READ_CAP: usize = 64 * 1024;

/// Host-side command timeout when no sandbox is available.
const HOST_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("execution failed: {0}")]
    Failed(String),
    #[error("path escapes the workspace: {0}")]
    PathEscape(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ToolError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ToolError::InvalidArgs(_) => ErrorCode::InvalidInput,
            ToolError::PathEscape(_) => ErrorCode::InvalidInput,
            ToolError::Timeout(_) => ErrorCode::Timeout,
            ToolError::Failed(_) => ErrorCode::ExecutionError,
        }
    }
}

/// Per-process execution context handed to every tool call.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub pid: Pid,
    pub uid: AgentUid,
    pub goal: String,
    /// The process workspace; file tools may not leave it.
    pub workspace: PathBuf,
    pub now_ms: u64,
}

/// One named, schema-described side effect.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> ToolSpec;
    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError>;
}

/// The ordered tool catalog an agent dispatches on.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) {
        self.tools.push(tool);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.iter().find(|tool| tool.spec().name == name).cloned()
    }

    /// Catalog specs in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.spec().name).collect()
    }
}

/// Runs `run_command` payloads — in the sandbox when one exists.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, ctx: &ToolContext, command: &str) -> Result<String, ToolError>;
}

/// Always runs on the host, jailed to the workspace cwd.
pub struct HostCommandRunner;

#[async_trait]
impl CommandRunner for HostCommandRunner {
    async fn run(&self, ctx: &ToolContext, command: &str) -> Result<String, ToolError> {
        let mut cmd = tokio::process::Command::new("bash");
        cmd.arg("-c").arg(command).current_dir(&ctx.workspace);
        let output = run_with_timeout(cmd, HOST_COMMAND_TIMEOUT, "host command")
            .await
            .map_err(|e| match e {
                crate::sandbox::SandboxError::Timeout { after, .. } => ToolError::Timeout(after),
                other => ToolError::Failed(other.to_string()),
            })?;
        if !output.status.success() {
            return Err(ToolError::Failed(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Prefers the process's container; falls back to the host runner when the
/// process is uncontainerized.
pub struct SandboxCommandRunner<C: Clock> {
    containers: Arc<ContainerManager<C>>,
}

impl<C: Clock> SandboxCommandRunner<C> {
    pub fn new(containers: Arc<ContainerManager<C>>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl<C: Clock> CommandRunner for SandboxCommandRunner<C> {
    async fn run(&self, ctx: &ToolContext, command: &str) -> Result<String, ToolError> {
        if self.containers.get(ctx.pid).is_some() {
            return self
                .containers
                .exec(ctx.pid, command, ExecOptions::default())
                .await
                .map_err(|e| match e {
                    crate::sandbox::SandboxError::Timeout { after, .. } => {
                        ToolError::Timeout(after)
                    }
                    other => ToolError::Failed(other.to_string()),
                });
        }
        HostCommandRunner.run(ctx, command).await
    }
}

// -- argument helpers --

fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArgs(format!("missing string field '{key}'")))
}

fn arg_str_or<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Resolve a caller path inside the workspace. Absolute paths and any
/// `..` component are refused outright, so the jail holds even for paths
/// that do not exist yet.
fn workspace_path(ctx: &ToolContext, raw: &str) -> Result<PathBuf, ToolError> {
    let path = Path::new(raw);
    if path.is_absolute() {
        return Err(ToolError::PathEscape(raw.to_string()));
    }
    for component in path.components() {
        match component {
            Component::ParentDir => return Err(ToolError::PathEscape(raw.to_string())),
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(ToolError::PathEscape(raw.to_string())),
        }
    }
    Ok(ctx.workspace.join(path))
}

fn string_schema(fields: &[(&str, &str)], required: &[&str]) -> Value {
    let mut properties = serde_json::Map::new();
    for (name, description) in fields {
        properties.insert(
            (*name).to_string(),
            serde_json::json!({ "type": "string", "description": description }),
        );
    }
    serde_json::json!({ "type": "object", "properties": properties, "required": required })
}

// -- native tools --

/// Record intermediate reasoning without side effects.
struct ThinkTool;

#[async_trait]
impl ToolHandler for ThinkTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("think", "Reason about the goal without side effects")
            .parameters(string_schema(&[("thought", "What to think about")], &["thought"]))
    }

    async fn execute(&self, _ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let thought = arg_str(args, "thought")?;
        Ok(format!("Thought: {thought}"))
    }
}

/// Finishes the run; the driver exits the loop when this tool is chosen.
struct CompleteTool;

#[async_trait]
impl ToolHandler for CompleteTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("complete", "Declare the goal achieved and stop")
            .parameters(string_schema(&[("summary", "What was accomplished")], &[]))
    }

    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        Ok(arg_str_or(args, "summary", &ctx.goal).to_string())
    }
}

struct FileReadTool;

#[async_trait]
impl ToolHandler for FileReadTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("file_read", "Read a file from the workspace")
            .parameters(string_schema(&[("path", "Workspace-relative path")], &["path"]))
    }

    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let path = workspace_path(ctx, arg_str(args, "path")?)?;
        let mut content =
            tokio::fs::read_to_string(&path).await.map_err(|e| ToolError::Failed(e.to_string()))?;
        if content.len() > FILE_READ_CAP {
            let mut end = FILE_READ_CAP;
            while !content.is_char_boundary(end) {
                end -= 1;
            }
            content.truncate(end);
            content.push_str("\n…[truncated]");
        }
        Ok(content)
    }
}

struct FileWriteTool;

#[async_trait]
impl ToolHandler for FileWriteTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("file_write", "Write a file inside the workspace").parameters(string_schema(
            &[
                ("path", "Workspace-relative path"),
                ("content", "Full file content"),
            ],
            &["path", "content"],
        ))
    }

    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let path = workspace_path(ctx, arg_str(args, "path")?)?;
        let content = arg_str(args, "content")?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::Failed(e.to_string()))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))?;
        Ok(format!("Wrote {} bytes to {}", content.len(), arg_str(args, "path")?))
    }
}

struct FileListTool;

#[async_trait]
impl ToolHandler for FileListTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("file_list", "List files in a workspace directory")
            .parameters(string_schema(&[("path", "Workspace-relative directory")], &[]))
    }

    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let path = workspace_path(ctx, arg_str_or(args, "path", "."))?;
        let mut reader =
            tokio::fs::read_dir(&path).await.map_err(|e| ToolError::Failed(e.to_string()))?;
        let mut names = Vec::new();
        while let Some(entry) =
            reader.next_entry().await.map_err(|e| ToolError::Failed(e.to_string()))?
        {
            let suffix = if entry.path().is_dir() { "/" } else { "" };
            names.push(format!("{}{}", entry.file_name().to_string_lossy(), suffix));
        }
        names.sort();
        Ok(names.join("\n"))
    }
}

/// Shell access; approval-gated and sandbox-first.
struct RunCommandTool {
    runner: Arc<dyn CommandRunner>,
}

#[async_trait]
impl ToolHandler for RunCommandTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("run_command", "Run a shell command in the agent sandbox")
            .parameters(string_schema(&[("command", "Shell command line")], &["command"]))
            .requires_approval(true)
    }

    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let command = arg_str(args, "command")?;
        self.runner.run(ctx, command).await
    }
}

/// Store a self-assessment of the run and announce it on the bus.
struct ReflectTool<C: Clock> {
    bus: EventBus<C>,
    store: Arc<StateStore>,
}

#[async_trait]
impl<C: Clock> ToolHandler for ReflectTool<C> {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("reflect", "Record a self-assessment of the run").parameters(string_schema(
            &[
                ("summary", "What happened"),
                ("quality_rating", "1 (failed) to 5 (fully achieved)"),
                ("justification", "Why that rating"),
                ("lessons_learned", "What to do differently next time"),
            ],
            &["summary", "quality_rating"],
        ))
    }

    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let rating_raw = match args.get("quality_rating") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(3),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| ToolError::InvalidArgs("quality_rating must be 1-5".into()))?,
            _ => return Err(ToolError::InvalidArgs("missing quality_rating".into())),
        };
        let record = ReflectionRecord {
            id: format!("ref-{}", nanoid::nanoid!(12)),
            agent_uid: ctx.uid,
            pid: ctx.pid,
            goal: ctx.goal.clone(),
            summary: arg_str(args, "summary")?.to_string(),
            quality_rating: ReflectionRecord::clamp_rating(rating_raw),
            justification: arg_str_or(args, "justification", "").to_string(),
            lessons_learned: arg_str_or(args, "lessons_learned", "").to_string(),
            created_at_ms: ctx.now_ms,
        };

        self.store
            .append_reflection(record.clone())
            .map_err(|e| ToolError::Failed(e.to_string()))?;
        self.bus.emit(Event::ReflectionStored {
            id: record.id.clone(),
            agent_uid: record.agent_uid.to_string(),
            pid: record.pid,
            quality_rating: record.quality_rating,
        });
        Ok(format!("Stored reflection {} (rating {})", record.id, record.quality_rating))
    }
}

/// Build the full native catalog in its canonical order.
pub fn native_registry<C: Clock>(
    bus: EventBus<C>,
    store: Arc<StateStore>,
    runner: Arc<dyn CommandRunner>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ThinkTool));
    registry.register(Arc::new(CompleteTool));
    registry.register(Arc::new(FileReadTool));
    registry.register(Arc::new(FileWriteTool));
    registry.register(Arc::new(FileListTool));
    registry.register(Arc::new(RunCommandTool { runner }));
    registry.register(Arc::new(ReflectTool { bus, store }));
    registry
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
