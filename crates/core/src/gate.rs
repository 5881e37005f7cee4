// SPDX-License-Identifier: MIT

//! Gate configuration (read from a branch's working tree `cook.toml`) and
//! Gate Run records (spec §3, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A named shell command declared in the repository's `cook.toml`. No
/// cross-branch state; the same gate name can run against many branches.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Gate {
    pub name: String,
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GateConfigFile {
    #[serde(default)]
    gates: Vec<Gate>,
}

/// Parsed `cook.toml`. Only the `[[gates]]` table array is read; unknown
/// top-level keys are ignored so the file can carry other project config.
#[derive(Debug, Clone, Default)]
pub struct GateConfig {
    pub gates: Vec<Gate>,
}

impl GateConfig {
    pub fn parse(contents: &str) -> Result<Self, CoreError> {
        let file: GateConfigFile = toml::from_str(contents).map_err(|e| CoreError::GateConfig(e.to_string()))?;
        Ok(Self { gates: file.gates })
    }

    pub fn gate(&self, name: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRunStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

/// One recorded execution of a gate against a specific revision. The
/// *latest* row per `(branch, gate_name)` is authoritative; callers look
/// this up with a `MAX(id)`-correlated query rather than a mutable
/// "current" column (spec §3.1), so history stays queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRun {
    pub id: i64,
    pub repo_owner: String,
    pub repo_name: String,
    pub branch_name: String,
    pub gate_name: String,
    pub rev: String,
    pub status: GateRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub log_path: String,
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
