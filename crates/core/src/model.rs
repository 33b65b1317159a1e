// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model family selection types for the router.

use serde::{Deserialize, Serialize};

/// Model capability tier an agent step is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// Cheap and fast; routine file/memory work.
    Flash,
    /// Default tier.
    Standard,
    /// Most capable tier; code and browser work.
    Frontier,
}

crate::simple_display! {
    ModelFamily {
        Flash => "flash",
        Standard => "standard",
        Frontier => "frontier",
    }
}

/// Inputs to a routing decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    /// The agent's full tool set.
    pub tools: Vec<String>,
    pub step_count: u32,
    #[serde(default)]
    pub max_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}
