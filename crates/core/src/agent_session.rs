// SPDX-License-Identifier: MIT

//! Agent Session Record (spec §3): the durable record of one agent run
//! against a branch, distinct from the live in-memory Terminal Session
//! that carries its actual I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentSessionStatus {
    Starting,
    Running,
    Completed,
    Failed,
    NeedsHelp,
}

/// At most one `running` record per branch is expected at a time; the
/// latest-by-id record may be resumed after a server restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSessionRecord {
    pub id: i64,
    pub repo_owner: String,
    pub repo_name: String,
    pub branch_name: String,
    pub kind: String,
    pub prompt: String,
    pub status: AgentSessionStatus,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}
