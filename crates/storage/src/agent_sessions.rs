// SPDX-License-Identifier: MIT

use chrono::Utc;
use cook_core::{AgentSessionRecord, AgentSessionStatus};
use sqlx::SqlitePool;

use crate::error::StorageError;

fn status_to_str(status: AgentSessionStatus) -> &'static str {
    match status {
        AgentSessionStatus::Starting => "starting",
        AgentSessionStatus::Running => "running",
        AgentSessionStatus::Completed => "completed",
        AgentSessionStatus::Failed => "failed",
        AgentSessionStatus::NeedsHelp => "needs_help",
    }
}

fn status_from_str(value: &str) -> Result<AgentSessionStatus, StorageError> {
    match value {
        "starting" => Ok(AgentSessionStatus::Starting),
        "running" => Ok(AgentSessionStatus::Running),
        "completed" => Ok(AgentSessionStatus::Completed),
        "failed" => Ok(AgentSessionStatus::Failed),
        "needs_help" => Ok(AgentSessionStatus::NeedsHelp),
        other => Err(StorageError::BadStatus { field: "agent_sessions.status", value: other.to_string() }),
    }
}

#[derive(sqlx::FromRow)]
struct AgentSessionRow {
    id: i64,
    repo_owner: String,
    repo_name: String,
    branch_name: String,
    kind: String,
    prompt: String,
    status: String,
    pid: Option<i64>,
    exit_code: Option<i64>,
    started_at: String,
    ended_at: Option<String>,
}

fn row_to_session(row: AgentSessionRow) -> Result<AgentSessionRecord, StorageError> {
    Ok(AgentSessionRecord {
        id: row.id,
        repo_owner: row.repo_owner,
        repo_name: row.repo_name,
        branch_name: row.branch_name,
        kind: row.kind,
        prompt: row.prompt,
        status: status_from_str(&row.status)?,
        pid: row.pid.map(|v| v as u32),
        exit_code: row.exit_code.map(|v| v as i32),
        started_at: row.started_at.parse().map_err(|_| StorageError::BadStatus { field: "agent_sessions.started_at", value: row.started_at })?,
        ended_at: row
            .ended_at
            .map(|v| v.parse().map_err(|_| StorageError::BadStatus { field: "agent_sessions.ended_at", value: v.clone() }))
            .transpose()?,
    })
}

/// Record a newly-started agent session in `starting` state; returns its
/// assigned id.
pub async fn start(pool: &SqlitePool, repo_owner: &str, repo_name: &str, branch_name: &str, kind: &str, prompt: &str) -> Result<i64, StorageError> {
    let started_at = Utc::now();
    let result = sqlx::query(
        "INSERT INTO agent_sessions (repo_owner, repo_name, branch_name, kind, prompt, status, pid, exit_code, started_at, ended_at) \
         VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, NULL)",
    )
    .bind(repo_owner)
    .bind(repo_name)
    .bind(branch_name)
    .bind(kind)
    .bind(prompt)
    .bind(status_to_str(AgentSessionStatus::Starting))
    .bind(started_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Attach the backend process id once the agent has actually launched and
/// move the record to `running`.
pub async fn mark_running(pool: &SqlitePool, id: i64, pid: Option<u32>) -> Result<(), StorageError> {
    sqlx::query("UPDATE agent_sessions SET status = ?, pid = ? WHERE id = ?")
        .bind(status_to_str(AgentSessionStatus::Running))
        .bind(pid.map(|v| v as i64))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record the terminal outcome of an agent session by id.
pub async fn finish(pool: &SqlitePool, id: i64, status: AgentSessionStatus, exit_code: Option<i32>) -> Result<(), StorageError> {
    sqlx::query("UPDATE agent_sessions SET status = ?, exit_code = ?, ended_at = ? WHERE id = ?")
        .bind(status_to_str(status))
        .bind(exit_code.map(|v| v as i64))
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// The most recent agent session recorded for this branch, the one a
/// restarted server resumes reattachment against (spec §3, §4.5).
pub async fn latest_for_branch(pool: &SqlitePool, repo_owner: &str, repo_name: &str, branch_name: &str) -> Result<Option<AgentSessionRecord>, StorageError> {
    let row = sqlx::query_as::<_, AgentSessionRow>(
        "SELECT a.id, a.repo_owner, a.repo_name, a.branch_name, a.kind, a.prompt, a.status, a.pid, a.exit_code, a.started_at, a.ended_at \
         FROM agent_sessions a \
         INNER JOIN ( \
             SELECT MAX(id) AS max_id FROM agent_sessions WHERE repo_owner = ? AND repo_name = ? AND branch_name = ? \
         ) latest ON a.id = latest.max_id",
    )
    .bind(repo_owner)
    .bind(repo_name)
    .bind(branch_name)
    .fetch_optional(pool)
    .await?;
    row.map(row_to_session).transpose()
}

#[cfg(test)]
#[path = "agent_sessions_tests.rs"]
mod tests;
