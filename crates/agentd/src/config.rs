// SPDX-License-Identifier: MIT

use clap::Parser;

/// In-environment agent daemon: owns local pseudo-terminals and speaks the
/// agent protocol over WebSocket so a server outside the environment can
/// attach a live terminal view through a container or remote sandbox.
#[derive(Debug, Parser)]
#[command(name = "cook-agentd", version, about)]
pub struct Config {
    /// Port to listen on.
    #[arg(long, env = "COOK_AGENTD_PORT", default_value = "7422")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "COOK_AGENTD_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Log format (json or text).
    #[arg(long, env = "COOK_AGENTD_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "COOK_AGENTD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("--port must be nonzero");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
