// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kernel configuration, read once from the environment at construction.
//!
//! Components receive a [`KernelConfig`] by reference at boot; nothing else
//! in the kernel touches `std::env`.

use crate::quota::ResourceQuota;
use std::path::PathBuf;
use std::time::Duration;

/// All recognized configuration, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Host root for workspaces and state (`AETHER_FS_ROOT`).
    pub fs_root: PathBuf,
    /// debug | info | warn | error (`AETHER_LOG_LEVEL`).
    pub log_level: String,
    /// Kernel-wide quota defaults (`AETHER_MAX_*`).
    pub default_quota: ResourceQuota,
    /// Audit retention window in days.
    pub retention_days: u32,
    /// Default audit query page size.
    pub audit_page_size: usize,
    /// Sleep between agent loop steps.
    pub inter_step_interval: Duration,
    /// How long an approval gate waits before treating silence as rejection.
    pub approval_timeout: Duration,
    /// Grace period before a container stop escalates to kill.
    pub container_grace: Duration,
    /// Upper bound for buffered stream output per client.
    pub max_buffer_size: usize,
    /// Events queued per slow websocket consumer before dropping.
    pub ws_queued_events: usize,
    /// Authenticated request budget per minute at the boundary.
    pub rate_limit_auth_per_min: u32,
    /// Unauthenticated request budget per minute at the boundary.
    pub rate_limit_unauth_per_min: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            fs_root: default_fs_root(),
            log_level: "info".into(),
            default_quota: ResourceQuota::default(),
            retention_days: 30,
            audit_page_size: 50,
            inter_step_interval: Duration::from_secs(3),
            approval_timeout: Duration::from_secs(300),
            container_grace: Duration::from_secs(10),
            max_buffer_size: 10 * 1024 * 1024,
            ws_queued_events: 500,
            rate_limit_auth_per_min: 120,
            rate_limit_unauth_per_min: 30,
        }
    }
}

fn default_fs_root() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join(".aether")
}

/// Parse an env var, warning and falling back on invalid values.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl KernelConfig {
    /// Read configuration from the environment. Called once at boot.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let quota_defaults = defaults.default_quota;

        let fs_root = std::env::var("AETHER_FS_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.fs_root);

        let log_level = match std::env::var("AETHER_LOG_LEVEL") {
            Ok(level) if matches!(level.as_str(), "debug" | "info" | "warn" | "error") => level,
            Ok(level) => {
                tracing::warn!(value = %level, "unknown AETHER_LOG_LEVEL, using info");
                defaults.log_level
            }
            Err(_) => defaults.log_level,
        };

        Self {
            fs_root,
            log_level,
            default_quota: ResourceQuota {
                max_tokens_per_session: env_parse(
                    "AETHER_MAX_TOKENS_PER_SESSION",
                    quota_defaults.max_tokens_per_session,
                ),
                max_tokens_per_day: env_parse(
                    "AETHER_MAX_TOKENS_PER_DAY",
                    quota_defaults.max_tokens_per_day,
                ),
                max_steps: env_parse("AETHER_MAX_STEPS", quota_defaults.max_steps),
                max_wall_clock_ms: env_parse(
                    "AETHER_MAX_WALL_CLOCK_MS",
                    quota_defaults.max_wall_clock_ms,
                ),
            },
            retention_days: env_parse("AETHER_RETENTION_DAYS", defaults.retention_days),
            audit_page_size: env_parse("AETHER_AUDIT_PAGE_SIZE", defaults.audit_page_size),
            inter_step_interval: Duration::from_millis(env_parse(
                "AETHER_INTER_STEP_MS",
                defaults.inter_step_interval.as_millis() as u64,
            )),
            approval_timeout: Duration::from_millis(env_parse(
                "AETHER_APPROVAL_TIMEOUT_MS",
                defaults.approval_timeout.as_millis() as u64,
            )),
            container_grace: Duration::from_secs(env_parse(
                "AETHER_CONTAINER_GRACE_S",
                defaults.container_grace.as_secs(),
            )),
            max_buffer_size: defaults.max_buffer_size,
            ws_queued_events: defaults.ws_queued_events,
            rate_limit_auth_per_min: defaults.rate_limit_auth_per_min,
            rate_limit_unauth_per_min: defaults.rate_limit_unauth_per_min,
        }
    }

    /// Directory that holds per-agent workspaces.
    pub fn workspace_root(&self) -> PathBuf {
        self.fs_root.join("workspaces")
    }

    /// Directory the StateStore opens.
    pub fn state_root(&self) -> PathBuf {
        self.fs_root.join("state")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
