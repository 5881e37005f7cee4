// SPDX-License-Identifier: MIT

//! Shared value types for the environment backend abstraction (spec
//! component C6): the context a backend operates against, its persisted
//! reattachment handle, and the status it reports.

use serde::{Deserialize, Serialize};

/// Everything a backend needs to provision or reattach to an environment
/// for one branch. Borrowed by every `EnvironmentBackend` call.
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: String,
    /// Path to the repository's bare git directory on the host.
    pub bare_repo_path: String,
    pub dotfiles_url: Option<String>,
}

impl EnvironmentContext {
    /// The session key a terminal for this branch's agent channel is
    /// registered under (spec §3: `repo/branch`).
    pub fn session_key(&self) -> String {
        format!("{}/{}", self.repo_name, self.branch)
    }
}

/// Tagged variant describing where a branch's environment lives and how
/// to reattach to it. Round-trips losslessly through `environment_json`
/// (spec §3.1) so a restarted server can call `from_handle` again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvironmentSpec {
    Local { working_path: String, dotfiles_url: Option<String> },
    Container { working_path: String, dotfiles_url: Option<String>, container_id: Option<String> },
    Remote {
        working_path: String,
        dotfiles_url: Option<String>,
        sandbox_id: Option<String>,
        agent_addr: Option<String>,
    },
}

impl EnvironmentSpec {
    pub fn working_path(&self) -> &str {
        match self {
            EnvironmentSpec::Local { working_path, .. } => working_path,
            EnvironmentSpec::Container { working_path, .. } => working_path,
            EnvironmentSpec::Remote { working_path, .. } => working_path,
        }
    }

    pub fn dotfiles_url(&self) -> Option<&str> {
        match self {
            EnvironmentSpec::Local { dotfiles_url, .. }
            | EnvironmentSpec::Container { dotfiles_url, .. }
            | EnvironmentSpec::Remote { dotfiles_url, .. } => dotfiles_url.as_deref(),
        }
    }
}

/// Liveness of an environment as reported by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentState {
    Starting,
    Running,
    Stopped,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub state: EnvironmentState,
    pub id: Option<String>,
    pub message: Option<String>,
}

/// Result of `EnvironmentBackend::command`: a platform process handle
/// usable as the target of a local-side pseudo-terminal attach, or a
/// marker that this backend can't do interactive attach directly and
/// callers must go through the in-environment agent protocol (C4/C5).
#[derive(Debug, Clone)]
pub enum CommandHandle {
    Local { argv: Vec<String>, env: Vec<(String, String)> },
    Unsupported,
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
