// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The kernel event bus: typed, synchronous, in-process pub/sub.
//!
//! `emit` runs every subscriber on the caller's task before returning, in
//! registration order, topic subscribers before wildcard subscribers. A
//! failing handler is logged and never stops the fanout or reaches the
//! emitter. Handlers therefore must not do long I/O; anything slow belongs
//! on its own task.
//!
//! Every emitted event gets an `eventId` stamp; re-emitting an envelope
//! whose id was already seen is a no-op. The remembered-id set is bounded
//! (FIFO eviction) so the bus memory stays flat.

use aether_core::{event_id, Clock, Envelope, ErrorCode, Event, WILDCARD_TOPIC};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Most recently seen event ids remembered for deduplication.
const SEEN_IDS_CAP: usize = 1000;

/// Identifies one subscription; pass back to [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Error a handler reports to the bus. Logged, never propagated.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("timed out waiting for {topic}")]
    Timeout { topic: String },
    #[error("wait for {topic} was cancelled")]
    Cancelled { topic: String },
}

impl BusError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Timeout
    }
}

type Handler = Arc<dyn Fn(&Envelope) -> Result<(), HandlerError> + Send + Sync>;

struct Subscription {
    id: u64,
    topic: String,
    handler: Handler,
    once: bool,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subs: Vec<Subscription>,
}

#[derive(Default)]
struct SeenIds {
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl SeenIds {
    /// Record an id; returns false when it was already present.
    fn remember(&mut self, id: &str) -> bool {
        if self.set.contains(id) {
            return false;
        }
        if self.order.len() >= SEEN_IDS_CAP {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.order.push_back(id.to_string());
        self.set.insert(id.to_string());
        true
    }
}

struct BusInner<C: Clock> {
    clock: C,
    registry: Mutex<Registry>,
    seen: Mutex<SeenIds>,
}

/// Cheap-clone handle to the shared bus.
pub struct EventBus<C: Clock> {
    inner: Arc<BusInner<C>>,
}

impl<C: Clock> Clone for EventBus<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock> EventBus<C> {
    pub fn new(clock: C) -> Self {
        Self {
            inner: Arc::new(BusInner {
                clock,
                registry: Mutex::new(Registry::default()),
                seen: Mutex::new(SeenIds::default()),
            }),
        }
    }

    /// Subscribe a handler to a topic (or [`WILDCARD_TOPIC`] for all).
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> SubscriberId
    where
        F: Fn(&Envelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(topic, Arc::new(handler), false)
    }

    /// Subscribe a handler that fires at most once. It is removed from the
    /// registry before delivery begins, so a re-entrant emit cannot fire it
    /// twice.
    pub fn subscribe_once<F>(&self, topic: &str, handler: F) -> SubscriberId
    where
        F: Fn(&Envelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(topic, Arc::new(handler), true)
    }

    fn register(&self, topic: &str, handler: Handler, once: bool) -> SubscriberId {
        let mut registry = self.inner.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.subs.push(Subscription { id, topic: topic.to_string(), handler, once });
        SubscriberId(id)
    }

    /// Remove one subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.registry.lock().subs.retain(|sub| sub.id != id.0);
    }

    /// Remove every subscription for a topic.
    pub fn off(&self, topic: &str) {
        self.inner.registry.lock().subs.retain(|sub| sub.topic != topic);
    }

    /// Remove every subscription. Used by the shutdown drain.
    pub fn off_all(&self) {
        self.inner.registry.lock().subs.clear();
    }

    /// Subscriber count for a topic (diagnostics).
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.registry.lock().subs.iter().filter(|sub| sub.topic == topic).count()
    }

    /// Emit an event, stamping a fresh `eventId`. Returns the envelope that
    /// was delivered (useful for tests and re-emission).
    pub fn emit(&self, event: Event) -> Envelope {
        let envelope = Envelope::new(event, event_id(self.inner.clock.epoch_ms()));
        self.inner.seen.lock().remember(&envelope.event_id);
        self.dispatch(&envelope);
        envelope
    }

    /// Emit a pre-stamped envelope. Returns false (and delivers nothing)
    /// when the id has been seen before.
    pub fn emit_envelope(&self, envelope: Envelope) -> bool {
        if !self.inner.seen.lock().remember(&envelope.event_id) {
            tracing::debug!(topic = envelope.topic(), event_id = %envelope.event_id, "dropping duplicate event");
            return false;
        }
        self.dispatch(&envelope);
        true
    }

    fn dispatch(&self, envelope: &Envelope) {
        let topic = envelope.topic();

        // Snapshot matching handlers under the lock, dropping once-subs
        // before delivery, then dispatch with the lock released so handlers
        // may emit and (un)subscribe re-entrantly.
        let matched: Vec<(u64, Handler)> = {
            let mut registry = self.inner.registry.lock();
            let mut topic_handlers = Vec::new();
            let mut wildcard_handlers = Vec::new();
            registry.subs.retain(|sub| {
                if sub.topic == topic {
                    topic_handlers.push((sub.id, Arc::clone(&sub.handler)));
                    !sub.once
                } else if sub.topic == WILDCARD_TOPIC && topic != WILDCARD_TOPIC {
                    wildcard_handlers.push((sub.id, Arc::clone(&sub.handler)));
                    !sub.once
                } else {
                    true
                }
            });
            topic_handlers.extend(wildcard_handlers);
            topic_handlers
        };

        for (id, handler) in matched {
            if let Err(e) = handler(envelope) {
                tracing::error!(topic, subscriber = id, error = %e, "event handler failed");
            }
        }
    }

    /// Resolve with the first envelope emitted on `topic`, or time out.
    pub async fn wait_for(&self, topic: &str, timeout: Duration) -> Result<Envelope, BusError> {
        let (tx, rx) = tokio::sync::oneshot::channel::<Envelope>();
        let tx = Mutex::new(Some(tx));
        let id = self.subscribe_once(topic, move |envelope| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(envelope.clone());
            }
            Ok(())
        });

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) => Err(BusError::Cancelled { topic: topic.to_string() }),
            Err(_) => {
                self.unsubscribe(id);
                Err(BusError::Timeout { topic: topic.to_string() })
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
