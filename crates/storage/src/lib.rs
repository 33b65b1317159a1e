// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aether-storage: the StateStore.
//!
//! Durable state for the kernel: the append-only audit log, keyed document
//! stores (imported tools, reflections), and zstd-compressed kernel
//! snapshots. One store per state directory, guarded by an exclusive file
//! lock; a second kernel opening the same directory fails fast.

mod audit_log;
mod docs;
mod snapshot;
mod store;

pub use snapshot::{KernelSnapshot, CURRENT_SNAPSHOT_VERSION};
pub use store::{StateStore, StoreError};
