// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture: a kernel booted into a temp directory with a fake
//! clock, a scripted oracle, and a wildcard event recorder.

use aether_core::{Envelope, Event, FakeClock, KernelConfig};
use aether_kernel::kernel::Kernel;
use aether_kernel::{Decision, ScriptedOracle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct TestKernel {
    pub kernel: Arc<Kernel<FakeClock>>,
    pub events: Arc<Mutex<Vec<Envelope>>>,
    _dir: tempfile::TempDir,
}

pub async fn boot_with(decisions: Vec<Decision>) -> TestKernel {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = KernelConfig {
        fs_root: dir.path().join("aether"),
        inter_step_interval: Duration::ZERO,
        approval_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let kernel = Kernel::boot(config, FakeClock::new(), Arc::new(ScriptedOracle::new(decisions)))
        .await
        .expect("kernel boot");

    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        kernel.bus.subscribe(aether_core::WILDCARD_TOPIC, move |envelope| {
            events.lock().expect("events lock").push(envelope.clone());
            Ok(())
        });
    }
    TestKernel { kernel, events, _dir: dir }
}

pub async fn boot() -> TestKernel {
    boot_with(Vec::new()).await
}

impl TestKernel {
    pub fn recorded(&self) -> Vec<Event> {
        self.events
            .lock()
            .expect("events lock")
            .iter()
            .map(|envelope| envelope.event.clone())
            .collect()
    }

    /// Wait until the pid reaches a terminal state (its loop finished).
    pub async fn wait_terminal(&self, pid: aether_core::Pid) {
        for _ in 0..200 {
            if self
                .kernel
                .processes
                .get(pid)
                .map(|info| info.state.is_terminal())
                .unwrap_or(true)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pid {pid} never reached a terminal state");
    }
}
