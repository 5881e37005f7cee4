// SPDX-License-Identifier: MIT

use clap::Parser;

/// Server binding C1-C11 behind a small JSON/WebSocket API: repository,
/// task, branch, and gate CRUD plus live terminal attach.
#[derive(Debug, Parser)]
#[command(name = "cook-server", version, about)]
pub struct Config {
    /// Port to listen on.
    #[arg(long, env = "COOK_PORT", default_value = "7420")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "COOK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Path to the sqlite database file, or `sqlite::memory:` for an
    /// ephemeral in-process database.
    #[arg(long, env = "COOK_DATABASE_URL", default_value = "sqlite://cook.db")]
    pub database_url: String,

    /// Root directory for bare repositories and working-tree checkouts.
    #[arg(long, env = "COOK_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Log format (json or text).
    #[arg(long, env = "COOK_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "COOK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Timeout, in seconds, applied to non-streaming HTTP requests and
    /// gate execution. The terminal WebSocket endpoint is exempt.
    #[arg(long, env = "COOK_REQUEST_TIMEOUT_SECS", default_value = "60")]
    pub request_timeout_secs: u64,

    /// Container runtime binary used by the container backend.
    #[arg(long, env = "COOK_CONTAINER_RUNTIME", default_value = "docker")]
    pub container_runtime: String,

    /// Default container image for new container-backed branches.
    #[arg(long, env = "COOK_CONTAINER_IMAGE", default_value = "cook/workbench:latest")]
    pub container_image: String,

    /// Path to the `cook-agentd` binary injected into new containers.
    #[arg(long, env = "COOK_AGENTD_BINARY_PATH", default_value = "/usr/local/bin/cook-agentd")]
    pub agentd_binary_path: String,

    /// Base URL of the remote sandbox provider's control-plane API.
    #[arg(long, env = "COOK_REMOTE_BASE_URL")]
    pub remote_base_url: Option<String>,

    /// API key for the remote sandbox provider.
    #[arg(long, env = "COOK_REMOTE_API_KEY")]
    pub remote_api_key: Option<String>,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("--port must be nonzero");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("--request-timeout-secs must be nonzero");
        }
        if self.remote_api_key.is_some() != self.remote_base_url.is_some() {
            anyhow::bail!("--remote-base-url and --remote-api-key must be set together");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
