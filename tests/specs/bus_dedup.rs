// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-id deduplication on the kernel bus.

use super::support::boot;
use aether_core::{Envelope, Event, Pid};

#[tokio::test]
async fn duplicate_event_id_delivers_once() {
    let t = boot().await;
    let envelope = Envelope::new(Event::AgentApproved { pid: Pid(1) }, "A");

    assert!(t.kernel.bus.emit_envelope(envelope.clone()));
    assert!(!t.kernel.bus.emit_envelope(envelope));

    let delivered = t
        .recorded()
        .into_iter()
        .filter(|event| matches!(event, Event::AgentApproved { pid: Pid(1) }))
        .count();
    assert_eq!(delivered, 1);
}

#[tokio::test]
async fn handler_failure_does_not_block_later_subscribers() {
    let t = boot().await;
    t.kernel
        .bus
        .subscribe("agent.approved", |_| Err(aether_kernel::HandlerError::new("boom")));

    let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    {
        let seen = std::sync::Arc::clone(&seen);
        t.kernel.bus.subscribe("agent.approved", move |_| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });
    }

    t.kernel.bus.emit(Event::AgentApproved { pid: Pid(2) });
    assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 1);
}
