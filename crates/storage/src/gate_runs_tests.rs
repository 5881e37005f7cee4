// SPDX-License-Identifier: MIT

use cook_core::{Branch, GateRunStatus};
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
async fn start_then_finish_round_trips_status() {
    let pool = seeded_pool().await;
    let id = start(&pool, "acme", "widgets", "feature", "tests", "deadbeef", "/logs/1.log").await.unwrap();
    finish(&pool, id, GateRunStatus::Passed, Some(0)).await.unwrap();

    let latest = latest_per_gate(&pool, "acme", "widgets", "feature").await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].status, GateRunStatus::Passed);
    assert_eq!(latest[0].exit_code, Some(0));
}

#[tokio::test]
async fn latest_per_gate_picks_highest_id_per_gate_name() {
    let pool = seeded_pool().await;
    let first = start(&pool, "acme", "widgets", "feature", "tests", "rev1", "/logs/1.log").await.unwrap();
    finish(&pool, first, GateRunStatus::Failed, Some(1)).await.unwrap();
    let second = start(&pool, "acme", "widgets", "feature", "tests", "rev2", "/logs/2.log").await.unwrap();
    finish(&pool, second, GateRunStatus::Passed, Some(0)).await.unwrap();

    let latest = latest_per_gate(&pool, "acme", "widgets", "feature").await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, second);
    assert_eq!(latest[0].rev, "rev2");
}

#[tokio::test]
async fn latest_per_gate_returns_one_row_per_distinct_gate() {
    let pool = seeded_pool().await;
    let tests_run = start(&pool, "acme", "widgets", "feature", "tests", "rev1", "/logs/1.log").await.unwrap();
    finish(&pool, tests_run, GateRunStatus::Passed, Some(0)).await.unwrap();
    let lint_run = start(&pool, "acme", "widgets", "feature", "lint", "rev1", "/logs/2.log").await.unwrap();
    finish(&pool, lint_run, GateRunStatus::Passed, Some(0)).await.unwrap();

    let mut latest = latest_per_gate(&pool, "acme", "widgets", "feature").await.unwrap();
    latest.sort_by(|a, b| a.gate_name.cmp(&b.gate_name));
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].gate_name, "lint");
    assert_eq!(latest[1].gate_name, "tests");
}

#[tokio::test]
async fn start_defaults_to_pending_with_no_finish_fields() {
    let pool = seeded_pool().await;
    start(&pool, "acme", "widgets", "feature", "tests", "deadbeef", "/logs/1.log").await.unwrap();
    let latest = latest_per_gate(&pool, "acme", "widgets", "feature").await.unwrap();
    assert_eq!(latest[0].status, GateRunStatus::Pending);
    assert!(latest[0].finished_at.is_none());
    assert!(latest[0].exit_code.is_none());
}
