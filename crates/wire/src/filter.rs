// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic filters for the event stream.
//!
//! A filter is a comma-separated list of tokens; each token is either an
//! exact topic (`agent.action`) or a prefix wildcard (`agent.*`). An empty
//! filter forwards everything the whitelist allows.

/// Topic prefixes the stream is willing to forward at all.
const FORWARDABLE_PREFIXES: &[&str] = &[
    "process.",
    "agent.",
    "resource.",
    "container.",
    "workspace.",
    "tools.",
    "reflection.",
    "kernel.",
];

/// Whether the stream may forward this topic to external consumers.
pub fn is_forwardable(topic: &str) -> bool {
    FORWARDABLE_PREFIXES.iter().any(|prefix| topic.starts_with(prefix))
}

/// Parsed client topic filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Exact topics.
    exact: Vec<String>,
    /// `prefix.` strings from `prefix.*` tokens.
    prefixes: Vec<String>,
}

impl EventFilter {
    /// Parse a comma-separated filter. Blank tokens are ignored; an empty
    /// result matches every topic.
    pub fn parse(csv: &str) -> Self {
        let mut filter = EventFilter::default();
        for token in csv.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.strip_suffix(".*") {
                Some(prefix) => filter.prefixes.push(format!("{prefix}.")),
                None => filter.exact.push(token.to_string()),
            }
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    /// True when the topic passes this filter (empty filter passes all).
    pub fn matches(&self, topic: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        self.exact.iter().any(|t| t == topic)
            || self.prefixes.iter().any(|prefix| topic.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
