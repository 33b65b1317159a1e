// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE frame encoding.
//!
//! Each frame is `data: <json>\n\n`. Event payloads arrive already tagged
//! (`{"type": "<topic>", ...}`) so the frame encoder only wraps.

use aether_core::Envelope;

/// Encode one bus envelope as an SSE frame.
pub fn sse_frame(envelope: &Envelope) -> String {
    match serde_json::to_string(envelope) {
        Ok(json) => format!("data: {json}\n\n"),
        // Envelope serialization is infallible in practice; fall back to a
        // bare topic frame rather than dropping the event silently.
        Err(_) => format!("data: {{\"type\":\"{}\"}}\n\n", envelope.topic()),
    }
}

/// The synthetic first frame of every stream.
pub fn connected_frame() -> String {
    "data: {\"type\":\"connected\"}\n\n".to_string()
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
