// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The SSE event stream boundary.
//!
//! Bridges the synchronous bus to an async writer: the bus handler only
//! enqueues envelopes (bounded, drop-on-full), the serve loop writes SSE
//! frames. Disconnect or cancellation unsubscribes synchronously before
//! the loop returns.

use crate::bus::EventBus;
use aether_core::{Clock, Envelope};
use aether_wire::{connected_frame, is_forwardable, sse_frame, EventFilter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Events queued per slow consumer before the stream starts dropping.
const DEFAULT_QUEUE_CAP: usize = 500;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Serves bus events to external stream consumers.
pub struct EventStream<C: Clock> {
    bus: EventBus<C>,
    queue_cap: usize,
    connections: Arc<AtomicUsize>,
}

impl<C: Clock> EventStream<C> {
    pub fn new(bus: EventBus<C>, queue_cap: usize) -> Self {
        Self {
            bus,
            queue_cap: if queue_cap == 0 { DEFAULT_QUEUE_CAP } else { queue_cap },
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared live-consumer count (feeds the connections gauge).
    pub fn connections(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connections)
    }

    /// Stream whitelisted, filter-matching events to `writer` until the
    /// client disconnects or `cancel` fires. The first frame is always the
    /// synthetic `connected` frame.
    pub async fn serve<W>(
        &self,
        mut writer: W,
        filter: EventFilter,
        cancel: CancellationToken,
    ) -> Result<(), StreamError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Envelope>(self.queue_cap);
        let subscription = self.bus.subscribe(aether_core::WILDCARD_TOPIC, move |envelope| {
            let topic = envelope.topic();
            if !is_forwardable(topic) || !filter.matches(topic) {
                return Ok(());
            }
            // Slow consumers lose events rather than stalling the bus.
            if tx.try_send(envelope.clone()).is_err() {
                tracing::debug!(topic, "stream consumer queue full, dropping event");
            }
            Ok(())
        });
        self.connections.fetch_add(1, Ordering::SeqCst);

        let result = self.pump(&mut writer, &mut rx, &cancel).await;

        // Synchronous unsubscribe before returning to the caller.
        self.bus.unsubscribe(subscription);
        self.connections.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn pump<W>(
        &self,
        writer: &mut W,
        rx: &mut tokio::sync::mpsc::Receiver<Envelope>,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        writer.write_all(connected_frame().as_bytes()).await?;
        writer.flush().await?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else { return Ok(()) };
                    writer.write_all(sse_frame(&envelope).as_bytes()).await?;
                    writer.flush().await?;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
