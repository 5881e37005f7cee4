// SPDX-License-Identifier: MIT

use cook_core::{AgentSessionStatus, Branch};
use cook_environment::EnvironmentSpec;

use super::*;
use crate::branches;
use crate::pool::connect;
use crate::repositories;

async fn seeded_pool() -> sqlx::SqlitePool {
    let pool = connect("sqlite::memory:").await.unwrap();
    repositories::insert(&pool, "acme", "widgets").await.unwrap();
    let spec = EnvironmentSpec::Local { working_path: "/work".to_string(), dotfiles_url: None };
    let branch = Branch::new("acme", "widgets", "feature", None, "deadbeef".to_string(), spec).unwrap();
    branches::insert(&pool, &branch).await.unwrap();
    pool
}

#[tokio::test]
async fn start_then_latest_for_branch_round_trips() {
    let pool = seeded_pool().await;
    let id = start(&pool, "acme", "widgets", "feature", "codex", "fix the bug").await.unwrap();

    let latest = latest_for_branch(&pool, "acme", "widgets", "feature").await.unwrap().unwrap();
    assert_eq!(latest.id, id);
    assert_eq!(latest.status, AgentSessionStatus::Starting);
    assert_eq!(latest.prompt, "fix the bug");
}

#[tokio::test]
async fn mark_running_attaches_pid() {
    let pool = seeded_pool().await;
    let id = start(&pool, "acme", "widgets", "feature", "codex", "fix the bug").await.unwrap();
    mark_running(&pool, id, Some(4242)).await.unwrap();

    let latest = latest_for_branch(&pool, "acme", "widgets", "feature").await.unwrap().unwrap();
    assert_eq!(latest.status, AgentSessionStatus::Running);
    assert_eq!(latest.pid, Some(4242));
}

#[tokio::test]
async fn finish_records_exit_code_and_ended_at() {
    let pool = seeded_pool().await;
    let id = start(&pool, "acme", "widgets", "feature", "codex", "fix the bug").await.unwrap();
    mark_running(&pool, id, Some(4242)).await.unwrap();
    finish(&pool, id, AgentSessionStatus::Completed, Some(0)).await.unwrap();

    let latest = latest_for_branch(&pool, "acme", "widgets", "feature").await.unwrap().unwrap();
    assert_eq!(latest.status, AgentSessionStatus::Completed);
    assert_eq!(latest.exit_code, Some(0));
    assert!(latest.ended_at.is_some());
}

#[tokio::test]
async fn latest_for_branch_picks_most_recent_session() {
    let pool = seeded_pool().await;
    let first = start(&pool, "acme", "widgets", "feature", "codex", "first attempt").await.unwrap();
    finish(&pool, first, AgentSessionStatus::Failed, Some(1)).await.unwrap();
    let second = start(&pool, "acme", "widgets", "feature", "codex", "second attempt").await.unwrap();

    let latest = latest_for_branch(&pool, "acme", "widgets", "feature").await.unwrap().unwrap();
    assert_eq!(latest.id, second);
    assert_eq!(latest.prompt, "second attempt");
}

#[tokio::test]
async fn latest_for_branch_is_none_when_no_sessions_exist() {
    let pool = seeded_pool().await;
    assert!(latest_for_branch(&pool, "acme", "widgets", "feature").await.unwrap().is_none());
}
