// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path traversal never escapes the workspace root.

use super::support::boot;

#[tokio::test]
async fn traversal_names_are_rejected_without_mutation() {
    let t = boot().await;
    assert!(!t.kernel.workspaces.cleanup_workspace("../../etc"));
    assert!(!t.kernel.workspaces.cleanup_workspace(".."));
    assert!(!t.kernel.workspaces.cleanup_workspace("a/../../b"));
}

#[tokio::test]
async fn legitimate_cleanup_still_works() {
    let t = boot().await;
    let path = t.kernel.workspaces.create_workspace("agent-x").unwrap();
    assert!(path.is_dir());
    assert!(t.kernel.workspaces.cleanup_workspace("agent-x"));
    assert!(!path.exists());

    // Spawned agents keep their workspace after container removal; only
    // cleanup deletes it.
    let pid = t
        .kernel
        .processes
        .spawn(aether_core::SpawnConfig::builder().goal("g").build())
        .unwrap();
    let cwd = t.kernel.processes.get(pid).unwrap().cwd;
    t.kernel.containers.remove(pid).await.unwrap();
    assert!(cwd.exists());
}
