// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model family routing on the assembled kernel.

use super::support::boot;
use aether_core::{ModelFamily, RouteRequest};

fn request(tools: &[&str], step_count: u32) -> RouteRequest {
    RouteRequest {
        tools: tools.iter().map(|t| t.to_string()).collect(),
        step_count,
        max_steps: 200,
        goal: None,
    }
}

#[tokio::test]
async fn routing_follows_the_default_rules() {
    let t = boot().await;
    assert_eq!(
        t.kernel.router.route(&request(&["file_read", "file_write"], 0)),
        ModelFamily::Flash
    );
    assert_eq!(
        t.kernel.router.route(&request(&["code_generate", "file_read"], 5)),
        ModelFamily::Frontier
    );
    assert_eq!(
        t.kernel.router.route(&request(&["custom_tool"], 10)),
        ModelFamily::Standard
    );
}
