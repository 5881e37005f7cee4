// SPDX-License-Identifier: MIT

use super::*;

/// Write a stub "docker" CLI that records invocations and emits canned
/// output, so these tests exercise the backend's request shape without a
/// real container runtime.
fn fake_runtime(dir: &std::path::Path) -> String {
    let script = dir.join("fake-docker");
    let body = r#"#!/bin/sh
case "$1" in
  run) echo "fakecontainerid123" ;;
  exec) exit 0 ;;
  inspect) echo "true" ;;
  cp) exit 0 ;;
  rm) exit 0 ;;
  *) exit 0 ;;
esac
"#;
    std::fs::write(&script, body).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
    }
    script.to_string_lossy().into_owned()
}

fn ctx() -> EnvironmentContext {
    EnvironmentContext {
        repo_owner: "acme".to_string(),
        repo_name: "widgets".to_string(),
        branch: "feature".to_string(),
        bare_repo_path: "/srv/repos/acme/widgets.git".to_string(),
        dotfiles_url: None,
    }
}

#[tokio::test]
async fn setup_records_container_id_and_reports_running() {
    let bin_dir = tempfile::tempdir().unwrap();
    let runtime_bin = fake_runtime(bin_dir.path());
    let work = tempfile::tempdir().unwrap();
    let agentd = bin_dir.path().join("cook-agentd-stub");
    std::fs::write(&agentd, b"#!/bin/sh\n").unwrap();

    let config = ContainerRuntimeConfig {
        runtime_bin,
        image: "cook/workbench:latest".to_string(),
        agentd_binary_path: agentd,
        credentials_path: None,
    };
    let mut backend = ContainerBackend::new(work.path().join("checkout"), config);
    backend.setup(&ctx()).await.unwrap();

    assert!(backend.container_id.is_some());
    let status = backend.status().await;
    assert_eq!(status.state, EnvironmentState::Running);
    assert_eq!(backend.agent_addr().as_deref(), Some("localhost:7422"));
}

#[tokio::test]
async fn command_is_unsupported_for_container_backend() {
    let work = tempfile::tempdir().unwrap();
    let backend = ContainerBackend::new(work.path(), ContainerRuntimeConfig::default());
    assert!(matches!(backend.command(&["bash".to_string()]), CommandHandle::Unsupported));
}

#[tokio::test]
async fn agent_addr_absent_before_setup() {
    let work = tempfile::tempdir().unwrap();
    let backend = ContainerBackend::new(work.path(), ContainerRuntimeConfig::default());
    assert_eq!(backend.agent_addr(), None);
}

#[tokio::test]
async fn write_file_to_new_path_does_not_escape_workdir() {
    let work = tempfile::tempdir().unwrap();
    let working_path = work.path().join("checkout");
    std::fs::create_dir_all(&working_path).unwrap();
    let backend = ContainerBackend::new(working_path.clone(), ContainerRuntimeConfig::default());

    // A brand new file with no existing parent directory must still
    // confine to the working tree rather than falling back to an
    // unchecked join of the raw path.
    backend.write_file("notes/todo.txt", b"do the thing").await.unwrap();
    let root_real = working_path.canonicalize().unwrap();
    assert!(root_real.join("notes/todo.txt").exists());

    // `../../../tmp/evil.txt` must normalize under the working directory,
    // never escape it.
    backend.write_file("../../../tmp/evil.txt", b"pwned").await.unwrap();
    assert!(root_real.join("tmp/evil.txt").exists());
    assert!(!work.path().join("tmp/evil.txt").exists());
}
