// SPDX-License-Identifier: MIT

//! Top-level daemon runner — builds the router, binds the listener, serves.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::Store;
use crate::ws::ws_handler;

/// Configure the global tracing subscriber from `config`.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn build_router(state: Arc<Store>) -> Router {
    Router::new().route("/healthz", get(healthz)).route("/ws", get(ws_handler)).with_state(state)
}

/// Bind and serve until the process receives a shutdown signal.
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);
    config.validate()?;

    let state = Store::new();
    let router = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "cook-agentd listening");

    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
