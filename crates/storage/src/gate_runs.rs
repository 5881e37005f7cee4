// SPDX-License-Identifier: MIT

use chrono::Utc;
use cook_core::{GateRun, GateRunStatus};
use sqlx::SqlitePool;

use crate::error::StorageError;

fn status_to_str(status: GateRunStatus) -> &'static str {
    match status {
        GateRunStatus::Pending => "pending",
        GateRunStatus::Running => "running",
        GateRunStatus::Passed => "passed",
        GateRunStatus::Failed => "failed",
    }
}

fn status_from_str(value: &str) -> Result<GateRunStatus, StorageError> {
    match value {
        "pending" => Ok(GateRunStatus::Pending),
        "running" => Ok(GateRunStatus::Running),
        "passed" => Ok(GateRunStatus::Passed),
        "failed" => Ok(GateRunStatus::Failed),
        other => Err(StorageError::BadStatus { field: "gate_runs.status", value: other.to_string() }),
    }
}

#[derive(sqlx::FromRow)]
struct GateRunRow {
    id: i64,
    repo_owner: String,
    repo_name: String,
    branch_name: String,
    gate_name: String,
    rev: String,
    status: String,
    started_at: String,
    finished_at: Option<String>,
    exit_code: Option<i64>,
    log_path: String,
}

fn row_to_gate_run(row: GateRunRow) -> Result<GateRun, StorageError> {
    Ok(GateRun {
        id: row.id,
        repo_owner: row.repo_owner,
        repo_name: row.repo_name,
        branch_name: row.branch_name,
        gate_name: row.gate_name,
        rev: row.rev,
        status: status_from_str(&row.status)?,
        started_at: row.started_at.parse().map_err(|_| StorageError::BadStatus { field: "gate_runs.started_at", value: row.started_at })?,
        finished_at: row
            .finished_at
            .map(|v| v.parse().map_err(|_| StorageError::BadStatus { field: "gate_runs.finished_at", value: v.clone() }))
            .transpose()?,
        exit_code: row.exit_code.map(|v| v as i32),
        log_path: row.log_path,
    })
}

/// Start a new gate run row in `pending` state; returns its assigned id.
pub async fn start(
    pool: &SqlitePool,
    repo_owner: &str,
    repo_name: &str,
    branch_name: &str,
    gate_name: &str,
    rev: &str,
    log_path: &str,
) -> Result<i64, StorageError> {
    let started_at = Utc::now();
    let result = sqlx::query(
        "INSERT INTO gate_runs (repo_owner, repo_name, branch_name, gate_name, rev, status, started_at, finished_at, exit_code, log_path) \
         VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?)",
    )
    .bind(repo_owner)
    .bind(repo_name)
    .bind(branch_name)
    .bind(gate_name)
    .bind(rev)
    .bind(status_to_str(GateRunStatus::Pending))
    .bind(started_at.to_rfc3339())
    .bind(log_path)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Record the terminal outcome of a gate run by id.
pub async fn finish(pool: &SqlitePool, id: i64, status: GateRunStatus, exit_code: Option<i32>) -> Result<(), StorageError> {
    sqlx::query("UPDATE gate_runs SET status = ?, finished_at = ?, exit_code = ? WHERE id = ?")
        .bind(status_to_str(status))
        .bind(Utc::now().to_rfc3339())
        .bind(exit_code.map(|v| v as i64))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// The most recent gate run for every gate name that has ever run against
/// this branch, one row per `gate_name` (the one with the highest `id`) —
/// the lookup `Branch::check_merge_preconditions` needs (spec §3.1, §4.10).
pub async fn latest_per_gate(pool: &SqlitePool, repo_owner: &str, repo_name: &str, branch_name: &str) -> Result<Vec<GateRun>, StorageError> {
    let rows = sqlx::query_as::<_, GateRunRow>(
        "SELECT g.id, g.repo_owner, g.repo_name, g.branch_name, g.gate_name, g.rev, g.status, g.started_at, g.finished_at, g.exit_code, g.log_path \
         FROM gate_runs g \
         INNER JOIN ( \
             SELECT gate_name, MAX(id) AS max_id FROM gate_runs \
             WHERE repo_owner = ? AND repo_name = ? AND branch_name = ? \
             GROUP BY gate_name \
         ) latest ON g.gate_name = latest.gate_name AND g.id = latest.max_id \
         WHERE g.repo_owner = ? AND g.repo_name = ? AND g.branch_name = ?",
    )
    .bind(repo_owner)
    .bind(repo_name)
    .bind(branch_name)
    .bind(repo_owner)
    .bind(repo_name)
    .bind(branch_name)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(row_to_gate_run).collect()
}

#[cfg(test)]
#[path = "gate_runs_tests.rs"]
mod tests;
