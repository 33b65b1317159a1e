// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The kernel error taxonomy.
//!
//! Every subsystem error enum maps its variants onto one of these stable
//! codes; callers at the boundary branch on the code, humans read the
//! `Display` of the underlying error.

use serde::{Deserialize, Serialize};

/// Stable error code carried by every kernel-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Caller-visible bad input; never fatal.
    InvalidInput,
    /// Referenced pid/name/id does not exist; never fatal.
    NotFound,
    /// A quota ceiling was hit; the agent is terminated, the kernel lives.
    QuotaExceeded,
    /// A tool or container operation failed; recorded and the agent continues.
    ExecutionError,
    /// A wait expired: rejection for approvals, failure for exec/LLM.
    Timeout,
    /// External IO failed (container runtime, oracle transport).
    Transport,
    /// The kernel cannot run: StateStore unopenable or fs root unwritable.
    Fatal,
}

crate::simple_display! {
    ErrorCode {
        InvalidInput => "invalid_input",
        NotFound => "not_found",
        QuotaExceeded => "quota_exceeded",
        ExecutionError => "execution_error",
        Timeout => "timeout",
        Transport => "transport",
        Fatal => "fatal",
    }
}
