// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox container configuration and runtime records.
//!
//! A container's lifetime is a strict subset of its owning process's
//! lifetime: the ContainerManager creates it after `process.spawned` and
//! removes it before (or when) the process is reaped. The host workspace
//! directory always outlives the container.

use crate::process::Pid;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Requested sandbox parameters carried on a spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxConfig {
    /// Container image (e.g. "aether-sandbox:latest").
    pub image: String,
    #[serde(default = "SandboxConfig::default_memory_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "SandboxConfig::default_cpu_limit")]
    pub cpu_limit: f64,
    /// Network stays disabled unless explicitly requested.
    #[serde(default)]
    pub network_enabled: bool,
}

impl SandboxConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            memory_limit_mb: Self::default_memory_mb(),
            cpu_limit: Self::default_cpu_limit(),
            network_enabled: false,
        }
    }

    fn default_memory_mb() -> u64 {
        512
    }

    fn default_cpu_limit() -> f64 {
        1.0
    }

    crate::setters! {
        set {
            memory_limit_mb: u64,
            cpu_limit: f64,
            network_enabled: bool,
        }
    }
}

/// Lifecycle status of a sandbox container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Stopping,
    Removing,
}

crate::simple_display! {
    ContainerStatus {
        Running => "running",
        Stopping => "stopping",
        Removing => "removing",
    }
}

/// A live sandbox container owned by a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    /// 12-character engine identifier.
    pub container_id: String,
    pub pid: Pid,
    pub image: String,
    pub status: ContainerStatus,
    /// Host directory bind-mounted read-write at the canonical workspace path.
    pub host_volume: PathBuf,
    pub network_enabled: bool,
    pub memory_limit_mb: u64,
    pub cpu_limit: f64,
    pub created_at_ms: u64,
}

/// Canonical mount point for the workspace inside every sandbox.
pub const CONTAINER_WORKSPACE: &str = "/workspace";

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
