// SPDX-License-Identifier: MIT

use axum::routing::post;
use axum::Router;
use std::sync::Arc;

use super::*;
use crate::config::Config;
use crate::routes::repos::create_repo;

async fn test_router() -> (Router, Arc<Store>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = cook_storage::connect("sqlite::memory:").await.unwrap();
    let config = Config {
        port: 7420,
        host: "0.0.0.0".to_string(),
        database_url: "sqlite::memory:".to_string(),
        data_dir: dir.path().to_str().unwrap().to_string(),
        log_format: "json".to_string(),
        log_level: "info".to_string(),
        request_timeout_secs: 60,
        container_runtime: "docker".to_string(),
        container_image: "cook/workbench:latest".to_string(),
        agentd_binary_path: "/usr/local/bin/cook-agentd".to_string(),
        remote_base_url: None,
        remote_api_key: None,
    };
    let state = Store::new(pool, &config);
    let router = Router::new()
        .route("/api/v1/repos/:owner/:name", post(create_repo))
        .route("/api/v1/repos/:owner/:name/branches/:branch", post(create_branch))
        .route("/api/v1/repos/:owner/:name/branches/:branch/gates/:gate/run", post(run_gate))
        .route("/api/v1/repos/:owner/:name/branches/:branch/rebase", post(rebase_branch))
        .route("/api/v1/repos/:owner/:name/branches/:branch/merge", post(merge_branch))
        .route("/api/v1/repos/:owner/:name/branches/:branch/abandon", post(abandon_branch))
        .with_state(state.clone());
    (router, state, dir)
}

#[tokio::test]
async fn create_branch_provisions_a_local_working_tree() {
    let (router, _state, _dir) = test_router().await;
    let server = axum_test::TestServer::new(router).unwrap();

    server.post("/api/v1/repos/acme/widgets").await.assert_status_ok();
    let response = server.post("/api/v1/repos/acme/widgets/branches/feature").json(&serde_json::json!({"backend": "local"})).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "active");
    assert_eq!(body["base_rev"], body["head_rev"]);
}

#[tokio::test]
async fn create_branch_twice_conflicts() {
    let (router, _state, _dir) = test_router().await;
    let server = axum_test::TestServer::new(router).unwrap();

    server.post("/api/v1/repos/acme/widgets").await.assert_status_ok();
    server.post("/api/v1/repos/acme/widgets/branches/feature").json(&serde_json::json!({"backend": "local"})).await.assert_status_ok();
    let second = server.post("/api/v1/repos/acme/widgets/branches/feature").json(&serde_json::json!({"backend": "local"})).await;
    second.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn run_gate_without_cook_toml_is_not_found() {
    let (router, _state, _dir) = test_router().await;
    let server = axum_test::TestServer::new(router).unwrap();

    server.post("/api/v1/repos/acme/widgets").await.assert_status_ok();
    server.post("/api/v1/repos/acme/widgets/branches/feature").json(&serde_json::json!({"backend": "local"})).await.assert_status_ok();

    let response = server.post("/api/v1/repos/acme/widgets/branches/feature/gates/tests/run").await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn merge_without_gates_configured_is_precondition_failed() {
    let (router, _state, _dir) = test_router().await;
    let server = axum_test::TestServer::new(router).unwrap();

    server.post("/api/v1/repos/acme/widgets").await.assert_status_ok();
    server.post("/api/v1/repos/acme/widgets/branches/feature").json(&serde_json::json!({"backend": "local"})).await.assert_status_ok();

    let response = server.post("/api/v1/repos/acme/widgets/branches/feature/merge").await;
    response.assert_status(axum::http::StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn abandon_tears_down_the_environment_and_marks_abandoned() {
    let (router, state, _dir) = test_router().await;
    let server = axum_test::TestServer::new(router).unwrap();

    server.post("/api/v1/repos/acme/widgets").await.assert_status_ok();
    server.post("/api/v1/repos/acme/widgets/branches/feature").json(&serde_json::json!({"backend": "local"})).await.assert_status_ok();

    let response = server.post("/api/v1/repos/acme/widgets/branches/feature/abandon").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "abandoned");
    assert!(state.backends.lock().await.is_empty());
}

#[tokio::test]
async fn abandon_deletes_the_branch_row_and_dependent_gate_runs() {
    let (router, state, _dir) = test_router().await;
    let server = axum_test::TestServer::new(router).unwrap();

    server.post("/api/v1/repos/acme/widgets").await.assert_status_ok();
    server.post("/api/v1/repos/acme/widgets/branches/feature").json(&serde_json::json!({"backend": "local"})).await.assert_status_ok();

    cook_storage::gate_runs::start(&state.pool, "acme", "widgets", "feature", "test", "0".repeat(40).as_str(), "/tmp/log")
        .await
        .unwrap();

    server.post("/api/v1/repos/acme/widgets/branches/feature/abandon").await.assert_status_ok();

    assert!(cook_storage::branches::get(&state.pool, "acme", "widgets", "feature").await.unwrap().is_none());
    assert!(cook_storage::gate_runs::latest_per_gate(&state.pool, "acme", "widgets", "feature").await.unwrap().is_empty());
}
