// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn environment_json_round_trips_local() {
    let spec = EnvironmentSpec::Local { working_path: "/work/a".to_string(), dotfiles_url: None };
    let json = serde_json::to_string(&spec).unwrap();
    let parsed: EnvironmentSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, spec);
}

#[test]
fn environment_json_round_trips_remote_with_handle() {
    let spec = EnvironmentSpec::Remote {
        working_path: "/workspace".to_string(),
        dotfiles_url: Some("https://example.com/dotfiles.git".to_string()),
        sandbox_id: Some("sbx-123".to_string()),
        agent_addr: Some("https://sbx-123.tunnel.example/".to_string()),
    };
    let json = serde_json::to_string(&spec).unwrap();
    let parsed: EnvironmentSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, spec);
    assert!(json.contains("\"kind\":\"remote\""));
}

#[test]
fn session_key_joins_repo_and_branch() {
    let ctx = EnvironmentContext {
        repo_owner: "acme".to_string(),
        repo_name: "widgets".to_string(),
        branch: "fix-thing".to_string(),
        bare_repo_path: "/srv/repos/acme/widgets.git".to_string(),
        dotfiles_url: None,
    };
    assert_eq!(ctx.session_key(), "widgets/fix-thing");
}
