// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model family routing.
//!
//! A pure, ordered rule list over the agent's tool set and step count;
//! first match wins. Flash tool-set rules require the *whole* tool set to
//! be routine; other families match on any overlap, so one code tool is
//! enough to pull a mixed tool set up to the frontier tier.

use aether_core::{ModelFamily, RouteRequest};

/// Tools cheap enough that an agent using only them can run on flash.
const FLASH_TOOLS: &[&str] = &[
    "file_read",
    "file_write",
    "memory_query",
    "file_list",
    "list_files",
    "read_file",
    "write_file",
    "think",
    "recall",
    "remember",
];

const CODE_TOOLS: &[&str] = &["code_generate", "code_analyze", "code_review"];

const BROWSER_TOOLS: &[&str] = &[
    "browser_navigate",
    "browser_click",
    "browser_extract",
    "browser_screenshot",
];

/// Below this step count an agent without complex tools stays on flash.
const EARLY_STEP_THRESHOLD: u32 = 5;

enum Rule {
    /// Matches when every tool in the request is in `tools` (flash) or when
    /// any tool overlaps (other families).
    ToolSet {
        family: ModelFamily,
        tools: &'static [&'static str],
    },
    /// Matches when the step count is below the threshold and no tool in
    /// the request belongs to the complex sets.
    EarlySteps { threshold: u32 },
}

/// Ordered routing rules; first match wins.
pub struct ModelRouter {
    rules: Vec<Rule>,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self {
            rules: vec![
                Rule::ToolSet { family: ModelFamily::Flash, tools: FLASH_TOOLS },
                Rule::ToolSet { family: ModelFamily::Frontier, tools: CODE_TOOLS },
                Rule::ToolSet { family: ModelFamily::Frontier, tools: BROWSER_TOOLS },
                Rule::EarlySteps { threshold: EARLY_STEP_THRESHOLD },
            ],
        }
    }
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the family for a request. Falls back to `standard`.
    pub fn route(&self, request: &RouteRequest) -> ModelFamily {
        for rule in &self.rules {
            match rule {
                Rule::ToolSet { family: ModelFamily::Flash, tools } => {
                    if !request.tools.is_empty()
                        && request.tools.iter().all(|tool| tools.contains(&tool.as_str()))
                    {
                        return ModelFamily::Flash;
                    }
                }
                Rule::ToolSet { family, tools } => {
                    if request.tools.iter().any(|tool| tools.contains(&tool.as_str())) {
                        return *family;
                    }
                }
                Rule::EarlySteps { threshold } => {
                    if request.step_count < *threshold && !self.has_complex_tool(request) {
                        return ModelFamily::Flash;
                    }
                }
            }
        }
        ModelFamily::Standard
    }

    fn has_complex_tool(&self, request: &RouteRequest) -> bool {
        request.tools.iter().any(|tool| {
            CODE_TOOLS.contains(&tool.as_str()) || BROWSER_TOOLS.contains(&tool.as_str())
        })
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
