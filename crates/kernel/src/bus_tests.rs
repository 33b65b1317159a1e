// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aether_core::test_support::spawned_event;
use aether_core::{FakeClock, Pid};
use std::sync::atomic::{AtomicUsize, Ordering};

fn bus() -> EventBus<FakeClock> {
    EventBus::new(FakeClock::new())
}

fn approved(pid: u32) -> Event {
    Event::AgentApproved { pid: Pid(pid) }
}

#[test]
fn fanout_runs_in_registration_order() {
    let bus = bus();
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        bus.subscribe("agent.approved", move |_| {
            order.lock().push(tag);
            Ok(())
        });
    }

    bus.emit(approved(1));
    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
}

#[test]
fn failing_handler_does_not_stop_fanout() {
    let bus = bus();
    let called = Arc::new(AtomicUsize::new(0));

    bus.subscribe("agent.approved", |_| Err(HandlerError::new("boom")));
    {
        let called = Arc::clone(&called);
        bus.subscribe("agent.approved", move |_| {
            called.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    bus.emit(approved(1));
    assert_eq!(called.load(Ordering::SeqCst), 1);
}

#[test]
fn wildcard_sees_every_topic_after_topic_subscribers() {
    let bus = bus();
    let order = Arc::new(Mutex::new(Vec::new()));

    {
        let order = Arc::clone(&order);
        bus.subscribe(WILDCARD_TOPIC, move |envelope| {
            order.lock().push(format!("wildcard:{}", envelope.topic()));
            Ok(())
        });
    }
    {
        let order = Arc::clone(&order);
        bus.subscribe("agent.approved", move |_| {
            order.lock().push("topic".to_string());
            Ok(())
        });
    }

    bus.emit(approved(1));
    bus.emit(spawned_event(2));

    assert_eq!(
        *order.lock(),
        vec![
            "topic".to_string(),
            "wildcard:agent.approved".to_string(),
            "wildcard:process.spawned".to_string(),
        ]
    );
}

#[test]
fn duplicate_event_id_delivers_once() {
    let bus = bus();
    let count = Arc::new(AtomicUsize::new(0));
    {
        let count = Arc::clone(&count);
        bus.subscribe("agent.approved", move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    assert!(bus.emit_envelope(Envelope::new(approved(1), "A")));
    assert!(!bus.emit_envelope(Envelope::new(approved(1), "A")));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn stamped_emit_is_remembered_for_dedup() {
    let bus = bus();
    let count = Arc::new(AtomicUsize::new(0));
    {
        let count = Arc::clone(&count);
        bus.subscribe("agent.approved", move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    let envelope = bus.emit(approved(1));
    assert!(!bus.emit_envelope(envelope));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn seen_id_set_evicts_fifo() {
    let bus = bus();
    // Fill the set past capacity, then the first id is forgotten.
    assert!(bus.emit_envelope(Envelope::new(approved(1), "id-0")));
    for i in 1..=SEEN_IDS_CAP {
        assert!(bus.emit_envelope(Envelope::new(approved(1), format!("id-{i}"))));
    }
    // "id-0" was evicted, so it is accepted (delivered) again.
    assert!(bus.emit_envelope(Envelope::new(approved(1), "id-0")));
    // A recent id is still remembered.
    assert!(!bus.emit_envelope(Envelope::new(approved(1), format!("id-{SEEN_IDS_CAP}"))));
}

#[test]
fn once_subscription_fires_once() {
    let bus = bus();
    let count = Arc::new(AtomicUsize::new(0));
    {
        let count = Arc::clone(&count);
        bus.subscribe_once("agent.approved", move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    bus.emit(approved(1));
    bus.emit(approved(2));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscriber_count("agent.approved"), 0);
}

#[test]
fn unsubscribe_and_off() {
    let bus = bus();
    let count = Arc::new(AtomicUsize::new(0));

    let id = {
        let count = Arc::clone(&count);
        bus.subscribe("agent.approved", move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    bus.unsubscribe(id);
    bus.emit(approved(1));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    bus.subscribe("agent.approved", |_| Ok(()));
    bus.subscribe("agent.rejected", |_| Ok(()));
    bus.off("agent.approved");
    assert_eq!(bus.subscriber_count("agent.approved"), 0);
    assert_eq!(bus.subscriber_count("agent.rejected"), 1);

    bus.off_all();
    assert_eq!(bus.subscriber_count("agent.rejected"), 0);
}

#[test]
fn handler_may_emit_reentrantly() {
    let bus = bus();
    let seen = Arc::new(Mutex::new(Vec::new()));

    {
        let bus2 = bus.clone();
        bus.subscribe("agent.approved", move |envelope| {
            if let Event::AgentApproved { pid } = envelope.event {
                if pid.0 == 1 {
                    bus2.emit(approved(2));
                }
            }
            Ok(())
        });
    }
    {
        let seen = Arc::clone(&seen);
        bus.subscribe("agent.approved", move |envelope| {
            if let Event::AgentApproved { pid } = envelope.event {
                seen.lock().push(pid.0);
            }
            Ok(())
        });
    }

    bus.emit(approved(1));
    assert_eq!(*seen.lock(), vec![2, 1]);
}

#[tokio::test]
async fn wait_for_resolves_on_emit() {
    let bus = bus();
    let bus2 = bus.clone();
    let wait = tokio::spawn(async move {
        bus2.wait_for("agent.approved", Duration::from_secs(5)).await
    });

    // Give the waiter time to subscribe.
    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.emit(approved(9));

    let envelope = wait.await.unwrap().unwrap();
    assert_eq!(envelope.event, approved(9));
}

#[tokio::test]
async fn wait_for_times_out_deterministically() {
    let bus = bus();
    let err = bus.wait_for("agent.approved", Duration::from_millis(30)).await.unwrap_err();
    assert!(matches!(err, BusError::Timeout { ref topic } if topic == "agent.approved"));
    assert_eq!(err.code(), aether_core::ErrorCode::Timeout);
    // The once-subscription was cleaned up on timeout.
    assert_eq!(bus.subscriber_count("agent.approved"), 0);
}
