// SPDX-License-Identifier: MIT

use chrono::Utc;
use cook_core::{Branch, BranchStatus, TaskRef};
use cook_environment::EnvironmentSpec;
use sqlx::SqlitePool;

use crate::error::StorageError;

fn status_to_str(status: BranchStatus) -> &'static str {
    match status {
        BranchStatus::Active => "active",
        BranchStatus::Merged => "merged",
        BranchStatus::Abandoned => "abandoned",
    }
}

fn status_from_str(value: &str) -> Result<BranchStatus, StorageError> {
    match value {
        "active" => Ok(BranchStatus::Active),
        "merged" => Ok(BranchStatus::Merged),
        "abandoned" => Ok(BranchStatus::Abandoned),
        other => Err(StorageError::BadStatus { field: "branches.status", value: other.to_string() }),
    }
}

#[derive(sqlx::FromRow)]
struct BranchRow {
    repo_owner: String,
    repo_name: String,
    name: String,
    task_repo_owner: Option<String>,
    task_repo_name: Option<String>,
    task_slug: Option<String>,
    base_rev: String,
    head_rev: String,
    status: String,
    environment_json: String,
    created_at: String,
    updated_at: String,
}

fn row_to_branch(row: BranchRow) -> Result<Branch, StorageError> {
    let task = match (row.task_repo_owner, row.task_repo_name, row.task_slug) {
        (Some(owner), Some(name), Some(slug)) => Some(TaskRef { repo_owner: owner, repo_name: name, slug }),
        _ => None,
    };
    let environment: EnvironmentSpec =
        serde_json::from_str(&row.environment_json).map_err(|e| StorageError::Environment(e.to_string()))?;
    Ok(Branch {
        repo_owner: row.repo_owner,
        repo_name: row.repo_name,
        name: row.name,
        task,
        base_rev: row.base_rev,
        head_rev: row.head_rev,
        status: status_from_str(&row.status)?,
        environment,
        created_at: row.created_at.parse().map_err(|_| StorageError::BadStatus { field: "branches.created_at", value: row.created_at })?,
        updated_at: row.updated_at.parse().map_err(|_| StorageError::BadStatus { field: "branches.updated_at", value: row.updated_at })?,
    })
}

pub async fn insert(pool: &SqlitePool, branch: &Branch) -> Result<(), StorageError> {
    let environment_json = serde_json::to_string(&branch.environment).map_err(|e| StorageError::Environment(e.to_string()))?;
    sqlx::query(
        "INSERT INTO branches \
         (repo_owner, repo_name, name, task_repo_owner, task_repo_name, task_slug, base_rev, head_rev, status, environment_json, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&branch.repo_owner)
    .bind(&branch.repo_name)
    .bind(&branch.name)
    .bind(branch.task.as_ref().map(|t| &t.repo_owner))
    .bind(branch.task.as_ref().map(|t| &t.repo_name))
    .bind(branch.task.as_ref().map(|t| &t.slug))
    .bind(&branch.base_rev)
    .bind(&branch.head_rev)
    .bind(status_to_str(branch.status))
    .bind(environment_json)
    .bind(branch.created_at.to_rfc3339())
    .bind(branch.updated_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Persist every mutable field of `branch` (status, revs, environment
/// handle) — called after `rebase`/`merge`/`abandon` mutate the in-memory
/// value.
pub async fn update(pool: &SqlitePool, branch: &Branch) -> Result<(), StorageError> {
    let environment_json = serde_json::to_string(&branch.environment).map_err(|e| StorageError::Environment(e.to_string()))?;
    sqlx::query(
        "UPDATE branches SET base_rev = ?, head_rev = ?, status = ?, environment_json = ?, updated_at = ? \
         WHERE repo_owner = ? AND repo_name = ? AND name = ?",
    )
    .bind(&branch.base_rev)
    .bind(&branch.head_rev)
    .bind(status_to_str(branch.status))
    .bind(environment_json)
    .bind(Utc::now().to_rfc3339())
    .bind(&branch.repo_owner)
    .bind(&branch.repo_name)
    .bind(&branch.name)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, owner: &str, repo_name: &str, branch_name: &str) -> Result<Option<Branch>, StorageError> {
    let row = sqlx::query_as::<_, BranchRow>(
        "SELECT repo_owner, repo_name, name, task_repo_owner, task_repo_name, task_slug, base_rev, head_rev, status, environment_json, created_at, updated_at \
         FROM branches WHERE repo_owner = ? AND repo_name = ? AND name = ?",
    )
    .bind(owner)
    .bind(repo_name)
    .bind(branch_name)
    .fetch_optional(pool)
    .await?;
    row.map(row_to_branch).transpose()
}

/// All branches whose `status = 'active'` and whose Environment Spec names
/// a live container/remote handle — the set the server reattaches to on
/// startup (spec §4.11).
pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Branch>, StorageError> {
    let rows = sqlx::query_as::<_, BranchRow>(
        "SELECT repo_owner, repo_name, name, task_repo_owner, task_repo_name, task_slug, base_rev, head_rev, status, environment_json, created_at, updated_at \
         FROM branches WHERE status = 'active'",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(row_to_branch).collect()
}

pub async fn delete(pool: &SqlitePool, owner: &str, repo_name: &str, branch_name: &str) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM agent_sessions WHERE repo_owner = ? AND repo_name = ? AND branch_name = ?")
        .bind(owner)
        .bind(repo_name)
        .bind(branch_name)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM gate_runs WHERE repo_owner = ? AND repo_name = ? AND branch_name = ?")
        .bind(owner)
        .bind(repo_name)
        .bind(branch_name)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM branches WHERE repo_owner = ? AND repo_name = ? AND name = ?")
        .bind(owner)
        .bind(repo_name)
        .bind(branch_name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[path = "branches_tests.rs"]
mod tests;
