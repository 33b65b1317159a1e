// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host workspace directories, with the path-traversal guard.
//!
//! Workspaces outlive containers: `ContainerManager::remove` never touches
//! the host directory, only `cleanup_workspace` deletes one — and only
//! after proving the canonical target sits strictly inside the root.

use crate::bus::EventBus;
use aether_core::{Clock, Event};
use std::path::{Path, PathBuf};

use super::SandboxError;

/// Creates, lists, and deletes agent workspace directories under one root.
pub struct WorkspaceManager<C: Clock> {
    bus: EventBus<C>,
    root: PathBuf,
}

impl<C: Clock> WorkspaceManager<C> {
    pub fn new(bus: EventBus<C>, root: PathBuf) -> Result<Self, SandboxError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { bus, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (or reuse) a named workspace, owner-only permissions.
    /// Rejects names that would land outside the root.
    pub fn create_workspace(&self, name: &str) -> Result<PathBuf, SandboxError> {
        let dir = self.root.join(name);
        std::fs::create_dir_all(&dir)?;
        if !self.contains(&dir) {
            // Creation raced a symlink or the name walked out of the root;
            // undo and refuse.
            let _ = std::fs::remove_dir(&dir);
            return Err(SandboxError::CommandFailed {
                command: "create_workspace".to_string(),
                stderr: format!("workspace name escapes root: {name}"),
            });
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(dir)
    }

    /// Names of the directories directly under the root.
    pub fn list_workspaces(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    /// Delete a workspace directory.
    ///
    /// Returns false — with no filesystem mutation — when the name resolves
    /// outside the workspace root (or to the root itself), when the
    /// workspace does not exist, or when removal fails. Emits
    /// `workspace.cleaned` with the outcome.
    pub fn cleanup_workspace(&self, name: &str) -> bool {
        let success = self.cleanup_inner(name);
        self.bus.emit(Event::WorkspaceCleaned { agent_name: name.to_string(), success });
        success
    }

    fn cleanup_inner(&self, name: &str) -> bool {
        let candidate = self.root.join(name);
        let Ok(canonical) = candidate.canonicalize() else {
            tracing::warn!(name, "workspace cleanup refused: cannot resolve path");
            return false;
        };
        let Ok(root) = self.root.canonicalize() else {
            return false;
        };
        // Strictly inside the root: not the root itself, no `..` escape.
        if canonical == root || !canonical.starts_with(&root) {
            tracing::warn!(name, resolved = %canonical.display(), "workspace cleanup refused: path escapes root");
            return false;
        }

        match std::fs::remove_dir_all(&canonical) {
            Ok(()) => {
                tracing::info!(name, "workspace cleaned");
                true
            }
            Err(e) => {
                tracing::warn!(name, error = %e, "workspace cleanup failed");
                false
            }
        }
    }

    fn contains(&self, dir: &Path) -> bool {
        match (dir.canonicalize(), self.root.canonicalize()) {
            (Ok(canonical), Ok(root)) => canonical != root && canonical.starts_with(root),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
