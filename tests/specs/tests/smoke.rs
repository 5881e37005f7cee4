// SPDX-License-Identifier: MIT

//! End-to-end scenarios against an in-process `cook-server`, driven over
//! real HTTP and asserted against the bare git repos it produces.

use cook_specs::{bare_master_rev, commit_all, TestServer};

const COOK_TOML: &str = "[[gates]]\nname = \"test\"\ncommand = \"echo 'No tests configured'\"\n";

#[tokio::test]
async fn full_workflow_merges_branch_and_closes_task() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = reqwest::Client::new();

    let resp = client.post(server.url("/api/v1/repos/alice/demo")).send().await?;
    assert!(resp.status().is_success(), "create repo: {}", resp.status());

    let resp = client
        .post(server.url("/api/v1/repos/alice/demo/tasks"))
        .json(&serde_json::json!({"title": "Fix the bug"}))
        .send()
        .await?;
    assert!(resp.status().is_success(), "create task: {}", resp.status());
    let task: serde_json::Value = resp.json().await?;
    assert_eq!(task["slug"], "fix-bug");

    let resp = client
        .post(server.url("/api/v1/repos/alice/demo/branches/fix-bug"))
        .json(&serde_json::json!({
            "backend": "local",
            "task": {"repo_owner": "alice", "repo_name": "demo", "slug": "fix-bug"},
        }))
        .send()
        .await?;
    assert!(resp.status().is_success(), "create branch: {}", resp.status());

    let working_path = server.working_path("alice", "demo", "fix-bug");
    std::fs::write(working_path.join("cook.toml"), COOK_TOML)?;
    std::fs::write(working_path.join("FIXED.txt"), "Bug is fixed!\n")?;
    let head = commit_all(&working_path, "fix the bug")?;

    let resp = client.post(server.url("/api/v1/repos/alice/demo/branches/fix-bug/gates/test/run")).send().await?;
    assert!(resp.status().is_success(), "run gate: {}", resp.status());
    let run: serde_json::Value = resp.json().await?;
    assert_eq!(run["status"], "passed");
    assert_eq!(run["exit_code"], 0);

    let resp = client.post(server.url("/api/v1/repos/alice/demo/branches/fix-bug/merge")).send().await?;
    assert!(resp.status().is_success(), "merge: {}", resp.status());
    let branch: serde_json::Value = resp.json().await?;
    assert_eq!(branch["status"], "merged");
    assert_eq!(branch["head_rev"], head);

    let bare_path = server.bare_repo_path("alice", "demo");
    assert_eq!(bare_master_rev(&bare_path)?, head);

    let resp = client.get(server.url("/api/v1/repos/alice/demo/tasks/fix-bug")).send().await?;
    let task: serde_json::Value = resp.json().await?;
    assert_eq!(task["status"], "closed");

    assert!(!working_path.exists(), "working tree should be removed after merge");

    Ok(())
}

#[tokio::test]
async fn stale_gate_run_refuses_merge_until_rerun() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = reqwest::Client::new();

    let resp = client.post(server.url("/api/v1/repos/acme/widgets")).send().await?;
    assert!(resp.status().is_success(), "create repo: {}", resp.status());
    let resp = client
        .post(server.url("/api/v1/repos/acme/widgets/branches/feature"))
        .json(&serde_json::json!({"backend": "local"}))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let working_path = server.working_path("acme", "widgets", "feature");
    std::fs::write(working_path.join("cook.toml"), COOK_TOML)?;
    commit_all(&working_path, "add gate config")?;

    let resp = client.post(server.url("/api/v1/repos/acme/widgets/branches/feature/gates/test/run")).send().await?;
    assert!(resp.status().is_success());
    let run: serde_json::Value = resp.json().await?;
    assert_eq!(run["status"], "passed");

    std::fs::write(working_path.join("more.txt"), "one more change\n")?;
    commit_all(&working_path, "a later commit")?;

    let resp = client.post(server.url("/api/v1/repos/acme/widgets/branches/feature/merge")).send().await?;
    assert_eq!(resp.status().as_u16(), 412);
    let body: serde_json::Value = resp.json().await?;
    let message = body["error"].as_str().unwrap_or_default();
    assert!(message.contains("stale"), "expected a stale-gate message, got: {message}");
    assert!(message.contains("test"), "expected the gate name in the message, got: {message}");

    let resp = client.post(server.url("/api/v1/repos/acme/widgets/branches/feature/gates/test/run")).send().await?;
    assert!(resp.status().is_success());

    let resp = client.post(server.url("/api/v1/repos/acme/widgets/branches/feature/merge")).send().await?;
    assert!(resp.status().is_success(), "merge after rerun: {}", resp.status());
    let branch: serde_json::Value = resp.json().await?;
    assert_eq!(branch["status"], "merged");

    Ok(())
}
