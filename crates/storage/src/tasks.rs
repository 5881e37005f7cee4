// SPDX-License-Identifier: MIT

use chrono::Utc;
use cook_core::{CoreError, Task, TaskRef, TaskStatus};
use sqlx::SqlitePool;

use crate::error::StorageError;

fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Open => "open",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::NeedsHuman => "needs_human",
        TaskStatus::Closed => "closed",
    }
}

fn status_from_str(value: &str) -> Result<TaskStatus, StorageError> {
    match value {
        "open" => Ok(TaskStatus::Open),
        "in_progress" => Ok(TaskStatus::InProgress),
        "needs_human" => Ok(TaskStatus::NeedsHuman),
        "closed" => Ok(TaskStatus::Closed),
        other => Err(StorageError::BadStatus { field: "tasks.status", value: other.to_string() }),
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    repo_owner: String,
    repo_name: String,
    slug: String,
    title: String,
    body: String,
    priority: i64,
    status: String,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct DependencyRow {
    dep_repo_owner: String,
    dep_repo_name: String,
    dep_slug: String,
}

async fn dependencies_of(pool: &SqlitePool, owner: &str, name: &str, slug: &str) -> Result<Vec<TaskRef>, StorageError> {
    let rows = sqlx::query_as::<_, DependencyRow>(
        "SELECT dep_repo_owner, dep_repo_name, dep_slug FROM task_dependencies \
         WHERE repo_owner = ? AND repo_name = ? AND slug = ? ORDER BY position",
    )
    .bind(owner)
    .bind(name)
    .bind(slug)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| TaskRef { repo_owner: r.dep_repo_owner, repo_name: r.dep_repo_name, slug: r.dep_slug })
        .collect())
}

fn row_to_task(row: TaskRow, dependencies: Vec<TaskRef>) -> Result<Task, StorageError> {
    Ok(Task {
        repo_owner: row.repo_owner,
        repo_name: row.repo_name,
        slug: row.slug,
        title: row.title,
        body: row.body,
        priority: row.priority as i32,
        status: status_from_str(&row.status)?,
        dependencies,
        created_at: row.created_at.parse().map_err(|_| StorageError::BadStatus { field: "tasks.created_at", value: row.created_at })?,
        updated_at: row.updated_at.parse().map_err(|_| StorageError::BadStatus { field: "tasks.updated_at", value: row.updated_at })?,
    })
}

/// Derive the slug from `title` and insert a new task row, rejecting a
/// slug collision within the repository (spec §3).
pub async fn insert(
    pool: &SqlitePool,
    repo_owner: &str,
    repo_name: &str,
    title: &str,
    body: &str,
    priority: i32,
    dependencies: &[TaskRef],
) -> Result<Task, StorageError> {
    let slug = Task::slugify(title);
    let now = Utc::now();

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM tasks WHERE repo_owner = ? AND repo_name = ? AND slug = ?")
            .bind(repo_owner)
            .bind(repo_name)
            .bind(&slug)
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Err(CoreError::TaskExists.into());
    }

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO tasks (repo_owner, repo_name, slug, title, body, priority, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(repo_owner)
    .bind(repo_name)
    .bind(&slug)
    .bind(title)
    .bind(body)
    .bind(priority)
    .bind(status_to_str(TaskStatus::Open))
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    for (position, dep) in dependencies.iter().enumerate() {
        sqlx::query(
            "INSERT INTO task_dependencies (repo_owner, repo_name, slug, dep_repo_owner, dep_repo_name, dep_slug, position) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(repo_owner)
        .bind(repo_name)
        .bind(&slug)
        .bind(&dep.repo_owner)
        .bind(&dep.repo_name)
        .bind(&dep.slug)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(Task {
        repo_owner: repo_owner.to_string(),
        repo_name: repo_name.to_string(),
        slug,
        title: title.to_string(),
        body: body.to_string(),
        priority,
        status: TaskStatus::Open,
        dependencies: dependencies.to_vec(),
        created_at: now,
        updated_at: now,
    })
}

pub async fn get(pool: &SqlitePool, owner: &str, repo_name: &str, slug: &str) -> Result<Option<Task>, StorageError> {
    let row = sqlx::query_as::<_, TaskRow>(
        "SELECT repo_owner, repo_name, slug, title, body, priority, status, created_at, updated_at \
         FROM tasks WHERE repo_owner = ? AND repo_name = ? AND slug = ?",
    )
    .bind(owner)
    .bind(repo_name)
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else { return Ok(None) };
    let deps = dependencies_of(pool, owner, repo_name, slug).await?;
    Some(row_to_task(row, deps)).transpose()
}

/// Resolve the status of every dependency `task` declares, in order, for
/// use with [`cook_core::Task::is_blocked`]. A dependency that no longer
/// exists is treated as `needs_human` so a dangling reference still blocks
/// rather than silently unblocking the task.
pub async fn dependency_statuses(pool: &SqlitePool, task: &Task) -> Result<Vec<TaskStatus>, StorageError> {
    let mut statuses = Vec::with_capacity(task.dependencies.len());
    for dep in &task.dependencies {
        let status = get(pool, &dep.repo_owner, &dep.repo_name, &dep.slug)
            .await?
            .map(|t| t.status)
            .unwrap_or(TaskStatus::NeedsHuman);
        statuses.push(status);
    }
    Ok(statuses)
}

pub async fn set_status(pool: &SqlitePool, owner: &str, repo_name: &str, slug: &str, status: TaskStatus) -> Result<(), StorageError> {
    let now = Utc::now();
    sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE repo_owner = ? AND repo_name = ? AND slug = ?")
        .bind(status_to_str(status))
        .bind(now.to_rfc3339())
        .bind(owner)
        .bind(repo_name)
        .bind(slug)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
