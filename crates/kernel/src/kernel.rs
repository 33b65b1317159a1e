// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kernel boot, wiring, and the ordered shutdown drain.
//!
//! A single boot routine builds every component and passes references;
//! there are no process-wide singletons. Cross-component reactions
//! (container lifecycle, usage cleanup) are wired as bus subscriptions
//! here so the components themselves stay decoupled.

use crate::agent::{
    native_registry, AgentDriver, DriverConfig, Oracle, SandboxCommandRunner, ToolRegistry,
};
use crate::audit::AuditLogger;
use crate::bus::EventBus;
use crate::compat::ToolCompatLayer;
use crate::govern::ResourceGovernor;
use crate::metrics::{MetricsExporter, MetricsRegistry};
use crate::proc::{ProcessError, ProcessManager};
use crate::router::ModelRouter;
use crate::sandbox::{ContainerManager, WorkspaceManager};
use crate::stream::EventStream;
use aether_core::{
    Clock, ErrorCode, Event, KernelConfig, Pid, ProcessState, QuotaUpdate, SpawnConfig,
};
use aether_storage::{StateStore, StoreError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const KERNEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interval of the `kernel.metrics` sampler.
const METRICS_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

/// How long shutdown waits for agent loops to observe cancellation.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BootError {
    #[error("filesystem root is not usable: {0}")]
    FsRoot(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BootError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Fatal
    }
}

/// The assembled kernel. Components are public so boundary surfaces can
/// reach the ones they consume.
pub struct Kernel<C: Clock> {
    pub config: KernelConfig,
    pub clock: C,
    pub bus: EventBus<C>,
    pub store: Arc<StateStore>,
    pub processes: Arc<ProcessManager<C>>,
    pub governor: Arc<ResourceGovernor<C>>,
    pub containers: Arc<ContainerManager<C>>,
    pub workspaces: Arc<WorkspaceManager<C>>,
    pub audit: Arc<AuditLogger<C>>,
    pub metrics: Arc<MetricsExporter<C>>,
    pub router: ModelRouter,
    pub compat: ToolCompatLayer<C>,
    pub stream: Arc<EventStream<C>>,
    pub tools: Arc<ToolRegistry>,
    oracle: Arc<dyn Oracle>,
    started_at_ms: u64,
    loops: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    sampler: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<C: Clock> std::fmt::Debug for Kernel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel").field("started_at_ms", &self.started_at_ms).finish_non_exhaustive()
    }
}

impl<C: Clock> Kernel<C> {
    /// Build and wire every component, probe the container runtime, and
    /// announce readiness. Only StateStore/fs-root failures abort.
    pub async fn boot(
        config: KernelConfig,
        clock: C,
        oracle: Arc<dyn Oracle>,
    ) -> Result<Arc<Self>, BootError> {
        std::fs::create_dir_all(&config.fs_root)
            .map_err(|e| BootError::FsRoot(format!("{}: {e}", config.fs_root.display())))?;
        probe_writable(&config)?;

        let store = Arc::new(StateStore::open(&config.state_root())?);
        let bus = EventBus::new(clock.clone());

        let processes = Arc::new(ProcessManager::new(
            bus.clone(),
            clock.clone(),
            config.workspace_root(),
        ));
        let containers = Arc::new(ContainerManager::new(
            bus.clone(),
            clock.clone(),
            config.container_grace,
        ));
        containers.init().await;

        let workspaces = Arc::new(
            WorkspaceManager::new(bus.clone(), config.workspace_root())
                .map_err(|e| BootError::FsRoot(e.to_string()))?,
        );
        let governor = Arc::new(ResourceGovernor::new(
            bus.clone(),
            clock.clone(),
            config.default_quota,
            Arc::clone(&processes),
        ));
        let audit = AuditLogger::new(
            bus.clone(),
            Arc::clone(&store),
            clock.clone(),
            config.retention_days,
        );
        audit.start_retention();

        let stream = Arc::new(EventStream::new(bus.clone(), config.ws_queued_events));
        let metrics = MetricsExporter::new(
            bus.clone(),
            clock.clone(),
            Arc::new(MetricsRegistry::new()),
            Arc::clone(&processes),
            stream.connections(),
        );

        let compat = ToolCompatLayer::new(bus.clone(), Arc::clone(&store), clock.clone());
        let tools = Arc::new(native_registry(
            bus.clone(),
            Arc::clone(&store),
            Arc::new(SandboxCommandRunner::new(Arc::clone(&containers))),
        ));

        let kernel = Arc::new(Self {
            started_at_ms: clock.epoch_ms(),
            config,
            clock,
            bus,
            store,
            processes,
            governor,
            containers,
            workspaces,
            audit,
            metrics,
            router: ModelRouter::new(),
            compat,
            stream,
            tools,
            oracle,
            loops: Mutex::new(Vec::new()),
            sampler: Mutex::new(None),
        });

        kernel.wire_lifecycle();
        kernel.start_sampler();

        kernel.bus.emit(Event::KernelReady {
            version: KERNEL_VERSION.to_string(),
            uptime_ms: 0,
        });
        tracing::info!(version = KERNEL_VERSION, "kernel ready");
        Ok(kernel)
    }

    /// Container lifecycle and usage cleanup react to process events; the
    /// managers stay unaware of each other.
    fn wire_lifecycle(self: &Arc<Self>) {
        // Exited processes lose their container (workspace stays).
        {
            let containers = Arc::clone(&self.containers);
            self.bus.subscribe("process.exit", move |envelope| {
                if let Event::ProcessExit { pid, .. } = envelope.event {
                    let containers = Arc::clone(&containers);
                    tokio::spawn(async move {
                        if let Err(e) = containers.remove(pid).await {
                            tracing::warn!(%pid, error = %e, "container removal after exit failed");
                        }
                    });
                }
                Ok(())
            });
        }
        // Reaped processes release their usage records.
        {
            let governor = Arc::clone(&self.governor);
            self.bus.subscribe("process.stateChange", move |envelope| {
                if let Event::ProcessStateChange { pid, state: ProcessState::Dead, .. } =
                    envelope.event
                {
                    governor.cleanup(pid);
                }
                Ok(())
            });
        }
    }

    fn start_sampler(self: &Arc<Self>) {
        let kernel = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(METRICS_SAMPLE_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                kernel.bus.emit(Event::KernelMetrics {
                    process_count: kernel.processes.active_count(),
                    cpu_percent: 0.0,
                    memory_mb: resident_memory_mb(),
                });
            }
        });
        *self.sampler.lock() = Some(handle);
    }

    /// Spawn an agent process and start its loop on a task. The sandbox
    /// (when requested and available) is created before the loop thinks.
    pub async fn spawn_agent(self: &Arc<Self>, config: SpawnConfig) -> Result<Pid, ProcessError> {
        let sandbox = config.sandbox.clone();
        let max_steps = config.max_steps;
        let pid = self.processes.spawn(config)?;

        if let Some(max_steps) = max_steps {
            self.governor
                .set_quota(pid, QuotaUpdate { max_steps: Some(max_steps), ..Default::default() });
        }

        // Containerization is opportunistic and must not delay the spawn;
        // until the container exists, tool execution falls back to the host.
        if let Some(sandbox) = sandbox {
            if let Some(info) = self.processes.get(pid) {
                let containers = Arc::clone(&self.containers);
                tokio::spawn(async move {
                    match containers.create(pid, &info.uid, &info.cwd, &sandbox).await {
                        Ok(Some(_)) | Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(%pid, error = %e, "sandbox creation failed, running on host")
                        }
                    }
                });
            }
        }

        let driver = AgentDriver::new(
            self.bus.clone(),
            Arc::clone(&self.processes),
            Arc::clone(&self.governor),
            Arc::clone(&self.tools),
            Arc::clone(&self.oracle),
            Some(Arc::clone(&self.metrics)),
            self.clock.clone(),
            DriverConfig::from_kernel(&self.config),
        );
        let handle = tokio::spawn(async move { driver.run(pid).await });
        self.loops.lock().push(handle);
        Ok(pid)
    }

    pub fn uptime_ms(&self) -> u64 {
        self.clock.epoch_ms().saturating_sub(self.started_at_ms)
    }

    /// Drain and stop, in the documented order: no new spawns → loops
    /// observe cancellation → containers go away → audit and metrics stop
    /// → the bus is cleared → state flushes.
    pub async fn shutdown(&self) {
        tracing::info!("kernel shutting down");
        self.processes.begin_shutdown();

        let loops: Vec<_> = self.loops.lock().drain(..).collect();
        let drain = async {
            for handle in loops {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!("agent loops did not drain in time, continuing shutdown");
        }

        self.containers.shutdown().await;
        self.audit.shutdown();
        self.metrics.shutdown();
        if let Some(handle) = self.sampler.lock().take() {
            handle.abort();
        }
        self.bus.off_all();
        if let Err(e) = self.store.flush() {
            tracing::warn!(error = %e, "state flush on shutdown failed");
        }
        tracing::info!("kernel shutdown complete");
    }
}

fn probe_writable(config: &KernelConfig) -> Result<(), BootError> {
    let probe = config.fs_root.join(".write-probe");
    std::fs::write(&probe, b"ok")
        .map_err(|e| BootError::FsRoot(format!("{} is not writable: {e}", config.fs_root.display())))?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

/// Resident set size of this process, for the `kernel.metrics` heartbeat.
fn resident_memory_mb() -> f64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
            if let Some(pages) = statm.split_whitespace().nth(1).and_then(|v| v.parse::<f64>().ok())
            {
                return pages * 4096.0 / (1024.0 * 1024.0);
            }
        }
    }
    0.0
}

#[cfg(test)]
#[path = "kernel_tests.rs"]
mod tests;
