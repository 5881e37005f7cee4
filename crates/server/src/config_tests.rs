// SPDX-License-Identifier: MIT

use super::*;

fn base() -> Config {
    Config {
        port: 7420,
        host: "0.0.0.0".to_string(),
        database_url: "sqlite::memory:".to_string(),
        data_dir: "./data".to_string(),
        log_format: "json".to_string(),
        log_level: "info".to_string(),
        request_timeout_secs: 60,
        container_runtime: "docker".to_string(),
        container_image: "cook/workbench:latest".to_string(),
        agentd_binary_path: "/usr/local/bin/cook-agentd".to_string(),
        remote_base_url: None,
        remote_api_key: None,
    }
}

#[test]
fn zero_port_is_rejected() {
    let config = Config { port: 0, ..base() };
    assert!(config.validate().is_err());
}

#[test]
fn zero_timeout_is_rejected() {
    let config = Config { request_timeout_secs: 0, ..base() };
    assert!(config.validate().is_err());
}

#[test]
fn default_config_validates() {
    assert!(base().validate().is_ok());
}

#[test]
fn remote_base_url_without_api_key_is_rejected() {
    let config = Config { remote_base_url: Some("https://sandboxes.example".to_string()), ..base() };
    assert!(config.validate().is_err());
}

#[test]
fn remote_base_url_with_api_key_validates() {
    let config = Config {
        remote_base_url: Some("https://sandboxes.example".to_string()),
        remote_api_key: Some("secret".to_string()),
        ..base()
    };
    assert!(config.validate().is_ok());
}
