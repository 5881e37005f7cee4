// SPDX-License-Identifier: MIT

use super::*;

fn local_spec() -> EnvironmentSpec {
    EnvironmentSpec::Local { working_path: "/work/repo".to_string(), dotfiles_url: None }
}

#[test]
fn resolve_agent_addr_is_none_for_local() {
    assert_eq!(resolve_agent_addr(&local_spec()), None);
}

#[test]
fn resolve_agent_addr_is_none_for_unprovisioned_container() {
    let spec = EnvironmentSpec::Container { working_path: "/work/repo".to_string(), dotfiles_url: None, container_id: None };
    assert_eq!(resolve_agent_addr(&spec), None);
}

#[test]
fn resolve_agent_addr_derives_host_port_for_provisioned_container() {
    let spec =
        EnvironmentSpec::Container { working_path: "/work/repo".to_string(), dotfiles_url: None, container_id: Some("c123".to_string()) };
    assert_eq!(resolve_agent_addr(&spec), Some(format!("localhost:{CONTAINER_AGENT_PORT}")));
}

#[test]
fn resolve_agent_addr_uses_stored_address_for_remote() {
    let spec = EnvironmentSpec::Remote {
        working_path: "/work/repo".to_string(),
        dotfiles_url: None,
        sandbox_id: Some("sbx-1".to_string()),
        agent_addr: Some("sandboxes.internal:9000".to_string()),
    };
    assert_eq!(resolve_agent_addr(&spec), Some("sandboxes.internal:9000".to_string()));
}

#[test]
fn resolve_agent_addr_is_none_for_remote_without_handle() {
    let spec = EnvironmentSpec::Remote { working_path: "/work/repo".to_string(), dotfiles_url: None, sandbox_id: None, agent_addr: None };
    assert_eq!(resolve_agent_addr(&spec), None);
}
