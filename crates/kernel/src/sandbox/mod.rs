// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox containers over the Docker CLI.
//!
//! Containerization is opportunistic: `init` probes the host runtime once,
//! and when it is absent every `create` returns `Ok(None)` so agents run
//! uncontainerized. Container lifecycle (run, exec, stop, rm) goes through
//! the `docker` CLI; the kernel never links a container runtime library.

mod workspace;

pub use workspace::WorkspaceManager;

use crate::bus::EventBus;
use aether_core::{
    AgentUid, Clock, ContainerInfo, ContainerStatus, ErrorCode, Event, Pid, SandboxConfig,
    CONTAINER_WORKSPACE,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::process::Output;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Probe timeout for `docker version`.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default timeout for `exec` when the caller does not pass one.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Non-root user agents run as inside the container.
const SANDBOX_USER: &str = "1000:1000";

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("container runtime unavailable")]
    Unavailable,
    #[error("no container for pid {0}")]
    NoContainer(Pid),
    #[error("docker {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("command exited with {code}: {stderr}")]
    ExecFailed { code: i32, stderr: String },
    #[error("{what} timed out after {after:?}")]
    Timeout { what: &'static str, after: Duration },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SandboxError::Timeout { .. } => ErrorCode::Timeout,
            SandboxError::NoContainer(_) => ErrorCode::NotFound,
            SandboxError::Unavailable => ErrorCode::Transport,
            _ => ErrorCode::ExecutionError,
        }
    }
}

/// Options for [`ContainerManager::exec`].
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub cwd: Option<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

/// Owner of the container map; one container at most per pid.
pub struct ContainerManager<C: Clock> {
    bus: EventBus<C>,
    clock: C,
    grace: Duration,
    available: AtomicBool,
    probed: AtomicBool,
    containers: Mutex<HashMap<Pid, ContainerInfo>>,
}

impl<C: Clock> ContainerManager<C> {
    pub fn new(bus: EventBus<C>, clock: C, grace: Duration) -> Self {
        Self {
            bus,
            clock,
            grace,
            available: AtomicBool::new(false),
            probed: AtomicBool::new(false),
            containers: Mutex::new(HashMap::new()),
        }
    }

    /// Probe the host container runtime once. Absence is not an error.
    pub async fn init(&self) {
        let probe = run_docker(&["version", "--format", "{{.Server.Version}}"], PROBE_TIMEOUT).await;
        let available = probe.is_ok();
        self.available.store(available, Ordering::SeqCst);
        self.probed.store(true, Ordering::SeqCst);
        match probe {
            Ok(version) => tracing::info!(%version, "container runtime available"),
            Err(e) => {
                tracing::warn!(error = %e, "container runtime unavailable, agents run uncontainerized")
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Create a sandbox for a process. Returns `Ok(None)` when the runtime
    /// is unavailable; the caller treats that as "run on the host".
    pub async fn create(
        &self,
        pid: Pid,
        uid: &AgentUid,
        host_volume: &Path,
        sandbox: &SandboxConfig,
    ) -> Result<Option<ContainerInfo>, SandboxError> {
        if !self.is_available() {
            return Ok(None);
        }

        let name = format!("aether-{}", uid.suffix());
        let memory = format!("{}m", sandbox.memory_limit_mb);
        let cpus = format!("{}", sandbox.cpu_limit);
        let volume = format!("{}:{}:rw", host_volume.display(), CONTAINER_WORKSPACE);

        let mut args: Vec<&str> = vec![
            "run",
            "-d",
            "--name",
            &name,
            "--memory",
            &memory,
            "--cpus",
            &cpus,
            "-v",
            &volume,
            "--workdir",
            CONTAINER_WORKSPACE,
            "--user",
            SANDBOX_USER,
        ];
        if !sandbox.network_enabled {
            args.extend_from_slice(&["--network", "none"]);
        }
        // Keep-alive command; all real work arrives through exec.
        args.extend_from_slice(&[&sandbox.image, "sleep", "infinity"]);

        let engine_id = run_docker(&args, DEFAULT_EXEC_TIMEOUT).await.map_err(|e| {
            tracing::warn!(%pid, error = %e, "container create failed");
            e
        })?;
        let container_id: String = engine_id.chars().take(12).collect();

        let info = ContainerInfo {
            container_id: container_id.clone(),
            pid,
            image: sandbox.image.clone(),
            status: ContainerStatus::Running,
            host_volume: host_volume.to_path_buf(),
            network_enabled: sandbox.network_enabled,
            memory_limit_mb: sandbox.memory_limit_mb,
            cpu_limit: sandbox.cpu_limit,
            created_at_ms: self.clock.epoch_ms(),
        };
        self.containers.lock().insert(pid, info.clone());

        tracing::info!(%pid, container_id = %container_id, image = %sandbox.image, "container created");
        self.bus.emit(Event::ContainerCreated {
            pid,
            container_id: container_id.clone(),
            image: sandbox.image.clone(),
        });
        self.bus.emit(Event::ContainerStarted { pid, container_id });
        Ok(Some(info))
    }

    /// Run a command inside the pid's container and return stdout.
    /// Non-zero exit or timeout is a failure.
    pub async fn exec(
        &self,
        pid: Pid,
        command: &str,
        options: ExecOptions,
    ) -> Result<String, SandboxError> {
        let container_id = {
            let containers = self.containers.lock();
            containers
                .get(&pid)
                .ok_or(SandboxError::NoContainer(pid))?
                .container_id
                .clone()
        };

        let mut args: Vec<String> = vec!["exec".into()];
        if let Some(cwd) = &options.cwd {
            args.push("-w".into());
            args.push(cwd.clone());
        }
        for (key, value) in &options.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        args.push(container_id);
        args.push("sh".into());
        args.push("-c".into());
        args.push(command.to_string());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let timeout = options.timeout.unwrap_or(DEFAULT_EXEC_TIMEOUT);
        let output = run_with_timeout(docker_command(&arg_refs), timeout, "container exec").await?;
        if !output.status.success() {
            return Err(SandboxError::ExecFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Spawn an interactive shell in the pid's container. Returns `None`
    /// when the process has no container.
    pub fn spawn_shell(
        &self,
        pid: Pid,
        options: ExecOptions,
    ) -> Result<Option<tokio::process::Child>, SandboxError> {
        let Some(container_id) = self
            .containers
            .lock()
            .get(&pid)
            .map(|info| info.container_id.clone())
        else {
            return Ok(None);
        };

        let mut command = tokio::process::Command::new("docker");
        command.arg("exec").arg("-i");
        if let Some(cwd) = &options.cwd {
            command.arg("-w").arg(cwd);
        }
        for (key, value) in &options.env {
            command.arg("-e").arg(format!("{key}={value}"));
        }
        command
            .arg(&container_id)
            .arg("sh")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let child = command.spawn()?;
        Ok(Some(child))
    }

    /// Stop (graceful, then forced) and remove the pid's container.
    /// Missing containers are tolerated. Never touches the host workspace.
    pub async fn remove(&self, pid: Pid) -> Result<(), SandboxError> {
        let Some(mut info) = self.containers.lock().remove(&pid) else {
            return Ok(());
        };
        info.status = ContainerStatus::Stopping;
        let container_id = info.container_id.clone();
        let grace_secs = format!("{}", self.grace.as_secs());

        let stop_timeout = self.grace + Duration::from_secs(5);
        let stopped =
            run_docker(&["stop", "-t", &grace_secs, &container_id], stop_timeout).await;
        if let Err(e) = stopped {
            tracing::warn!(%pid, container_id = %container_id, error = %e, "graceful stop failed, killing");
            if let Err(e) = run_docker(&["kill", &container_id], DEFAULT_EXEC_TIMEOUT).await {
                tracing::warn!(%pid, container_id = %container_id, error = %e, "container kill failed");
            }
        }
        self.bus.emit(Event::ContainerStopped { pid, container_id: container_id.clone() });

        info.status = ContainerStatus::Removing;
        if let Err(e) = run_docker(&["rm", "-f", &container_id], DEFAULT_EXEC_TIMEOUT).await {
            // Already-gone containers are fine.
            tracing::debug!(%pid, container_id = %container_id, error = %e, "container rm failed");
        }
        self.bus.emit(Event::ContainerRemoved { pid, container_id });
        Ok(())
    }

    pub fn get(&self, pid: Pid) -> Option<ContainerInfo> {
        self.containers.lock().get(&pid).cloned()
    }

    pub fn get_all(&self) -> Vec<ContainerInfo> {
        let mut all: Vec<_> = self.containers.lock().values().cloned().collect();
        all.sort_by_key(|info| info.pid);
        all
    }

    /// Stop and remove every container, concurrently.
    pub async fn shutdown(&self) {
        let pids: Vec<Pid> = self.containers.lock().keys().copied().collect();
        let removals = pids.into_iter().map(|pid| self.remove(pid));
        for result in futures_util::future::join_all(removals).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "container removal during shutdown failed");
            }
        }
    }
}

fn docker_command(args: &[&str]) -> tokio::process::Command {
    let mut command = tokio::process::Command::new("docker");
    command.args(args);
    command
}

/// Run a docker CLI command, trimming stdout on success.
async fn run_docker(args: &[&str], timeout: Duration) -> Result<String, SandboxError> {
    let output = run_with_timeout(docker_command(args), timeout, "docker").await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(SandboxError::CommandFailed {
            command: args.first().unwrap_or(&"").to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a subprocess with a hard timeout. The child is killed on expiry.
pub(crate) async fn run_with_timeout(
    mut command: tokio::process::Command,
    timeout: Duration,
    what: &'static str,
) -> Result<Output, SandboxError> {
    command.kill_on_drop(true);
    match tokio::time::timeout(timeout, command.output()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SandboxError::Timeout { what, after: timeout }),
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
