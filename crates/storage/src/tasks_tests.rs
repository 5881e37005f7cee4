// SPDX-License-Identifier: MIT

use super::*;
use crate::pool::connect;
use crate::repositories;

async fn seeded_pool() -> sqlx::SqlitePool {
    let pool = connect("sqlite::memory:").await.unwrap();
    repositories::insert(&pool, "acme", "widgets").await.unwrap();
    pool
}

#[tokio::test]
async fn insert_derives_slug_from_title() {
    let pool = seeded_pool().await;
    let task = insert(&pool, "acme", "widgets", "Add OAuth Login", "body text", 1, &[]).await.unwrap();
    assert_eq!(task.slug, "add-oauth-login");
    assert_eq!(task.status, TaskStatus::Open);
}

#[tokio::test]
async fn insert_rejects_slug_collision() {
    let pool = seeded_pool().await;
    insert(&pool, "acme", "widgets", "Add OAuth Login", "body", 1, &[]).await.unwrap();
    let result = insert(&pool, "acme", "widgets", "add oauth login", "body2", 2, &[]).await;
    assert!(matches!(result, Err(StorageError::Core(CoreError::TaskExists))));
}

#[tokio::test]
async fn get_round_trips_dependencies_in_order() {
    let pool = seeded_pool().await;
    insert(&pool, "acme", "widgets", "Write docs", "body", 1, &[]).await.unwrap();
    insert(&pool, "acme", "widgets", "Ship feature", "body", 1, &[]).await.unwrap();
    let deps = vec![
        TaskRef { repo_owner: "acme".to_string(), repo_name: "widgets".to_string(), slug: "write-docs".to_string() },
        TaskRef { repo_owner: "acme".to_string(), repo_name: "widgets".to_string(), slug: "ship-feature".to_string() },
    ];
    insert(&pool, "acme", "widgets", "Release", "body", 1, &deps).await.unwrap();

    let task = get(&pool, "acme", "widgets", "release").await.unwrap().unwrap();
    assert_eq!(task.dependencies, deps);
}

#[tokio::test]
async fn dependency_statuses_treats_missing_dependency_as_needs_human() {
    let pool = seeded_pool().await;
    let dangling = TaskRef { repo_owner: "acme".to_string(), repo_name: "widgets".to_string(), slug: "ghost".to_string() };
    let task = insert(&pool, "acme", "widgets", "Release", "body", 1, &[dangling]).await.unwrap();

    let statuses = dependency_statuses(&pool, &task).await.unwrap();
    assert_eq!(statuses, vec![TaskStatus::NeedsHuman]);
}

#[tokio::test]
async fn set_status_persists_and_bumps_updated_at() {
    let pool = seeded_pool().await;
    let task = insert(&pool, "acme", "widgets", "Add OAuth Login", "body", 1, &[]).await.unwrap();
    set_status(&pool, "acme", "widgets", &task.slug, TaskStatus::Closed).await.unwrap();
    let reloaded = get(&pool, "acme", "widgets", &task.slug).await.unwrap().unwrap();
    assert_eq!(reloaded.status, TaskStatus::Closed);
    assert!(reloaded.updated_at >= task.updated_at);
}
