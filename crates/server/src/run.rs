// SPDX-License-Identifier: MIT

//! Top-level server runner (spec §4.11): builds the router, reattaches
//! live branches from persisted state, binds the listener, serves.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use cook_environment::{ContainerBackend, EnvironmentBackend, EnvironmentSpec, LocalBackend, RemoteBackend};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::routes::{branches, repos, tasks, ws};
use crate::state::Store;

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
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/repos/:owner/:name", post(repos::create_repo))
        .route("/api/v1/repos/:owner/:name/tasks", post(tasks::create_task))
        .route("/api/v1/repos/:owner/:name/tasks/:slug", get(tasks::get_task))
        .route("/api/v1/repos/:owner/:name/branches/:branch", post(branches::create_branch))
        .route("/api/v1/repos/:owner/:name/branches/:branch/gates/:gate/run", post(branches::run_gate))
        .route("/api/v1/repos/:owner/:name/branches/:branch/rebase", post(branches::rebase_branch))
        .route("/api/v1/repos/:owner/:name/branches/:branch/merge", post(branches::merge_branch))
        .route("/api/v1/repos/:owner/:name/branches/:branch/abandon", post(branches::abandon_branch))
        .route("/api/v1/repos/:owner/:name/branches/:branch/attach", get(ws::attach_terminal))
        .with_state(state)
}

/// Reconnect to every branch left `active` by a prior process, registering
/// a live backend for each so routes find it under `state.backends`
/// without the caller having to re-provision anything.
async fn reattach_branches(state: &Arc<Store>) -> anyhow::Result<()> {
    let active = cook_storage::branches::list_active(&state.pool).await?;
    for branch in active {
        let session_key = branch.session_key();
        let backend: Option<Box<dyn EnvironmentBackend>> = match &branch.environment {
            EnvironmentSpec::Local { working_path, .. } => Some(Box::new(LocalBackend::from_handle(working_path.clone()))),
            EnvironmentSpec::Container { working_path, container_id: Some(id), .. } => {
                let config = cook_environment::ContainerRuntimeConfig {
                    runtime_bin: state.container_config.runtime_bin.clone(),
                    image: state.container_config.image.clone(),
                    agentd_binary_path: state.container_config.agentd_binary_path.clone(),
                    credentials_path: state.container_config.credentials_path.clone(),
                };
                Some(Box::new(ContainerBackend::from_handle(id.clone(), working_path.clone(), config)))
            }
            EnvironmentSpec::Remote { sandbox_id: Some(id), .. } => match &state.remote_client {
                Some(client) => match RemoteBackend::from_handle(client.clone(), id.clone()).await {
                    Ok(backend) => Some(Box::new(backend)),
                    Err(e) => {
                        warn!(branch = %session_key, error = %e, "failed to reattach remote sandbox, leaving branch unattached");
                        None
                    }
                },
                None => {
                    warn!(branch = %session_key, "active remote branch but no remote sandbox provider configured");
                    None
                }
            },
            _ => {
                warn!(branch = %session_key, "active branch has no provisioned environment handle, leaving unattached");
                None
            }
        };

        if let Some(backend) = backend {
            info!(branch = %session_key, "reattached environment");
            state.backends.lock().await.insert(session_key, backend);
        }
    }
    Ok(())
}

/// Bind and serve until the process receives a shutdown signal.
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);
    config.validate()?;

    let pool = cook_storage::connect(&config.database_url).await?;
    let state = Store::new(pool, &config);
    reattach_branches(&state).await?;

    let router = build_router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "cook-server listening");

    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
