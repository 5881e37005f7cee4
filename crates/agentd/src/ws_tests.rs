// SPDX-License-Identifier: MIT

use super::*;
use crate::state::Store;

#[test]
fn shell_command_wraps_in_cd_and_exec() {
    let (argv, env) = shell_command("echo hi", "/work/repo");
    assert_eq!(argv, vec!["/bin/sh", "-c", "cd '/work/repo' && exec echo hi"]);
    assert_eq!(env, vec![("TERM".to_string(), "xterm-256color".to_string())]);
}

#[test]
fn shell_command_escapes_single_quotes_in_workdir() {
    let (argv, _env) = shell_command("true", "/tmp/o'brien");
    assert_eq!(argv[2], "cd '/tmp/o'\\''brien' && exec true");
}

#[tokio::test]
async fn create_then_list_then_attach_roundtrip() {
    let state = Store::new();
    let mut key: Option<String> = None;
    let mut sub: Option<u64> = None;
    let mut rx: Option<mpsc::Receiver<Bytes>> = None;

    let create = serde_json::json!({
        "type": "create",
        "session_id": "repo/branch",
        "command": "true",
        "workdir": "/tmp",
        "rows": 24,
        "cols": 80,
    });
    let reply = handle_client_message(&state, &create.to_string(), &mut key, &mut sub, &mut rx).await;
    match reply {
        Some(ServerMessage::Ok { session_id }) => assert_eq!(session_id.as_deref(), Some("repo/branch")),
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(key.as_deref(), Some("repo/branch"));
    assert!(rx.is_some());

    let list = serde_json::json!({"type": "list"}).to_string();
    let mut no_key = None;
    let mut no_sub = None;
    let mut no_rx = None;
    let reply = handle_client_message(&state, &list, &mut no_key, &mut no_sub, &mut no_rx).await;
    match reply {
        Some(ServerMessage::List { sessions }) => assert!(sessions.contains(&"repo/branch".to_string())),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn attach_to_missing_session_returns_error() {
    let state = Store::new();
    let mut key = None;
    let mut sub = None;
    let mut rx = None;
    let attach = serde_json::json!({"type": "attach", "session_id": "nope"}).to_string();
    let reply = handle_client_message(&state, &attach, &mut key, &mut sub, &mut rx).await;
    assert!(matches!(reply, Some(ServerMessage::Error { .. })));
}

#[tokio::test]
async fn input_to_unknown_session_is_silently_dropped() {
    let state = Store::new();
    let mut key = None;
    let mut sub = None;
    let mut rx = None;
    let input = serde_json::json!({
        "type": "input",
        "session_id": "ghost",
        "data": "aGVsbG8=",
    })
    .to_string();
    let reply = handle_client_message(&state, &input, &mut key, &mut sub, &mut rx).await;
    assert!(reply.is_none());
}
