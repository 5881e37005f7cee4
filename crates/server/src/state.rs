// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use cook_environment::{ContainerRuntimeConfig, EnvironmentBackend, SandboxClient};
use cook_terminal::manager::TerminalManager;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::config::Config;

/// Shared state handed to every axum route.
pub struct Store {
    pub pool: SqlitePool,
    pub manager: Arc<TerminalManager>,
    /// Live environment backends, keyed by `Branch::session_key()`.
    /// Populated on branch creation and on startup reattachment.
    pub backends: Mutex<HashMap<String, Box<dyn EnvironmentBackend>>>,
    pub data_dir: String,
    pub container_config: ContainerRuntimeConfig,
    pub remote_client: Option<SandboxClient>,
    pub request_timeout_secs: u64,
}

impl Store {
    pub fn new(pool: SqlitePool, config: &Config) -> Arc<Self> {
        let container_config = ContainerRuntimeConfig {
            runtime_bin: config.container_runtime.clone(),
            image: config.container_image.clone(),
            agentd_binary_path: config.agentd_binary_path.clone().into(),
            credentials_path: None,
        };
        let remote_client = match (&config.remote_base_url, &config.remote_api_key) {
            (Some(base_url), Some(api_key)) => Some(SandboxClient::new(base_url.clone(), api_key.clone())),
            _ => None,
        };
        Arc::new(Self {
            pool,
            manager: Arc::new(TerminalManager::new()),
            backends: Mutex::new(HashMap::new()),
            data_dir: config.data_dir.clone(),
            container_config,
            remote_client,
            request_timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn bare_repo_path(&self, owner: &str, name: &str) -> std::path::PathBuf {
        let roots = std::path::Path::new(&self.data_dir).join("repos");
        cook_core::Repository::bare_path(&roots, owner, name)
    }

    pub fn working_path(&self, owner: &str, name: &str, branch: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("checkouts").join(owner).join(name).join(branch)
    }
}
