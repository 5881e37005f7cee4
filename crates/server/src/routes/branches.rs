// SPDX-License-Identifier: MIT

use std::path::Path as StdPath;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use cook_core::{Branch, CoreError, GateConfig, Repository};
use cook_environment::{ContainerBackend, EnvironmentBackend, EnvironmentContext, EnvironmentSpec, LocalBackend, RemoteBackend};

use crate::dto::{BranchResponse, CreateBranchBody, CreateBranchRequest, GateRunResponse};
use crate::error::CookError;
use crate::state::Store;

fn build_backend(state: &Store, spec: &EnvironmentSpec) -> Result<Box<dyn EnvironmentBackend>, CookError> {
    match spec {
        EnvironmentSpec::Local { working_path, .. } => Ok(Box::new(LocalBackend::new(working_path.clone()))),
        EnvironmentSpec::Container { working_path, .. } => {
            Ok(Box::new(ContainerBackend::new(working_path.clone(), clone_container_config(state))))
        }
        EnvironmentSpec::Remote { .. } => Err(CookError::internal("remote backend reattachment is handled at startup")),
    }
}

fn clone_container_config(state: &Store) -> cook_environment::ContainerRuntimeConfig {
    cook_environment::ContainerRuntimeConfig {
        runtime_bin: state.container_config.runtime_bin.clone(),
        image: state.container_config.image.clone(),
        agentd_binary_path: state.container_config.agentd_binary_path.clone(),
        credentials_path: state.container_config.credentials_path.clone(),
    }
}

pub async fn create_branch(
    State(state): State<Arc<Store>>,
    Path((owner, name, branch_name)): Path<(String, String, String)>,
    Json(body): Json<CreateBranchBody>,
) -> Result<Json<BranchResponse>, CookError> {
    if cook_storage::branches::get(&state.pool, &owner, &name, &branch_name).await?.is_some() {
        return Err(CoreError::BranchExists.into());
    }

    let bare_path = state.bare_repo_path(&owner, &name);
    let master_rev = {
        let bare_path = bare_path.clone();
        tokio::task::spawn_blocking(move || Repository::master_rev(&bare_path)).await.map_err(|e| CookError::internal(e.to_string()))??
    };

    let working_path = state.working_path(&owner, &name, &branch_name);
    let working_path_str = working_path.to_string_lossy().into_owned();
    let dotfiles_url = body.dotfiles_url.clone();

    let environment = match body.backend {
        CreateBranchRequest::Local => EnvironmentSpec::Local { working_path: working_path_str.clone(), dotfiles_url: dotfiles_url.clone() },
        CreateBranchRequest::Container => {
            EnvironmentSpec::Container { working_path: working_path_str.clone(), dotfiles_url: dotfiles_url.clone(), container_id: None }
        }
        CreateBranchRequest::Remote => {
            EnvironmentSpec::Remote { working_path: working_path_str.clone(), dotfiles_url: dotfiles_url.clone(), sandbox_id: None, agent_addr: None }
        }
    };

    let task = body.task.map(Into::into);
    let mut branch = Branch::new(&owner, &name, &branch_name, task, master_rev, environment)?;

    let ctx = EnvironmentContext {
        repo_owner: owner.clone(),
        repo_name: name.clone(),
        branch: branch_name.clone(),
        bare_repo_path: bare_path.to_string_lossy().into_owned(),
        dotfiles_url,
    };

    let mut backend = match &branch.environment {
        EnvironmentSpec::Remote { .. } => {
            let client = state.remote_client.clone().ok_or_else(|| CookError::bad_request("no remote sandbox provider configured"))?;
            Box::new(RemoteBackend::new(client, state.container_config.image.clone(), None)) as Box<dyn EnvironmentBackend>
        }
        other => build_backend(&state, other)?,
    };

    Branch::provision(&ctx, backend.as_mut()).await?;

    let report = backend.status().await;
    let agent_addr = backend.agent_addr();
    branch.environment = match branch.environment {
        EnvironmentSpec::Local { working_path, dotfiles_url } => EnvironmentSpec::Local { working_path, dotfiles_url },
        EnvironmentSpec::Container { working_path, dotfiles_url, .. } => {
            EnvironmentSpec::Container { working_path, dotfiles_url, container_id: report.id }
        }
        EnvironmentSpec::Remote { working_path, dotfiles_url, .. } => {
            EnvironmentSpec::Remote { working_path, dotfiles_url, sandbox_id: report.id, agent_addr }
        }
    };

    cook_storage::branches::insert(&state.pool, &branch).await?;
    state.backends.lock().await.insert(branch.session_key(), backend);

    Ok(Json(branch.into()))
}

async fn load_branch(state: &Store, owner: &str, name: &str, branch_name: &str) -> Result<Branch, CookError> {
    cook_storage::branches::get(&state.pool, owner, name, branch_name).await?.ok_or_else(|| CoreError::BranchNotFound.into())
}

async fn load_gate_config(state: &Store, branch: &Branch) -> GateConfig {
    let backends = state.backends.lock().await;
    let Some(backend) = backends.get(&branch.session_key()) else { return GateConfig::default() };
    match backend.read_file("cook.toml").await {
        Ok(bytes) => {
            let contents = String::from_utf8_lossy(&bytes);
            GateConfig::parse(&contents).unwrap_or_default()
        }
        Err(_) => GateConfig::default(),
    }
}

pub async fn run_gate(
    State(state): State<Arc<Store>>,
    Path((owner, name, branch_name, gate_name)): Path<(String, String, String, String)>,
) -> Result<Json<GateRunResponse>, CookError> {
    let branch = load_branch(&state, &owner, &name, &branch_name).await?;
    let gates = load_gate_config(&state, &branch).await;
    let gate = gates.gate(&gate_name).cloned().ok_or_else(|| CookError::not_found(format!("gate '{gate_name}' is not configured")))?;

    let working_path = StdPath::new(branch.environment.working_path()).to_path_buf();
    let head_rev = {
        let working_path = working_path.clone();
        tokio::task::spawn_blocking(move || cook_core::git::head_rev(&working_path)).await.map_err(|e| CookError::internal(e.to_string()))??
    };

    let run_id = cook_storage::gate_runs::start(&state.pool, &owner, &name, &branch_name, &gate_name, &head_rev, "").await?;

    let outcome = {
        let backends = state.backends.lock().await;
        let backend = backends.get(&branch.session_key()).ok_or_else(|| CookError::internal("branch has no live environment backend"))?;
        Branch::run_gate(&gate, backend.as_ref()).await
    };

    cook_storage::gate_runs::finish(&state.pool, run_id, outcome.status, outcome.exit_code).await?;

    Ok(Json(GateRunResponse { gate: gate_name, status: outcome.status, exit_code: outcome.exit_code }))
}

pub async fn rebase_branch(
    State(state): State<Arc<Store>>,
    Path((owner, name, branch_name)): Path<(String, String, String)>,
) -> Result<Json<BranchResponse>, CookError> {
    let branch = load_branch(&state, &owner, &name, &branch_name).await?;
    let working_path = StdPath::new(branch.environment.working_path()).to_path_buf();

    let branch = tokio::task::spawn_blocking(move || {
        let mut branch = branch;
        branch.rebase(&working_path)?;
        Ok::<_, CoreError>(branch)
    })
    .await
    .map_err(|e| CookError::internal(e.to_string()))??;

    cook_storage::branches::update(&state.pool, &branch).await?;
    Ok(Json(branch.into()))
}

pub async fn merge_branch(
    State(state): State<Arc<Store>>,
    Path((owner, name, branch_name)): Path<(String, String, String)>,
) -> Result<Json<BranchResponse>, CookError> {
    let branch = load_branch(&state, &owner, &name, &branch_name).await?;
    let gates = load_gate_config(&state, &branch).await;
    let latest_runs = cook_storage::gate_runs::latest_per_gate(&state.pool, &owner, &name, &branch_name).await?;
    let working_path = StdPath::new(branch.environment.working_path()).to_path_buf();

    let branch = tokio::task::spawn_blocking(move || {
        let mut branch = branch;
        branch.merge(&working_path, &gates, &latest_runs)?;
        Ok::<_, CoreError>(branch)
    })
    .await
    .map_err(|e| CookError::internal(e.to_string()))??;

    cook_storage::branches::update(&state.pool, &branch).await?;
    if let Some(task) = &branch.task {
        cook_storage::tasks::set_status(&state.pool, &task.repo_owner, &task.repo_name, &task.slug, cook_core::TaskStatus::Closed).await?;
    }

    let mut backends = state.backends.lock().await;
    if let Some(mut backend) = backends.remove(&branch.session_key()) {
        let _ = backend.teardown().await;
    }
    drop(backends);
    state.manager.remove(&branch.session_key()).await;

    Ok(Json(branch.into()))
}

pub async fn abandon_branch(
    State(state): State<Arc<Store>>,
    Path((owner, name, branch_name)): Path<(String, String, String)>,
) -> Result<Json<BranchResponse>, CookError> {
    let mut branch = load_branch(&state, &owner, &name, &branch_name).await?;

    let mut backends = state.backends.lock().await;
    let mut backend = backends.remove(&branch.session_key()).ok_or_else(|| CookError::internal("branch has no live environment backend"))?;
    drop(backends);

    branch.abandon(backend.as_mut()).await?;
    cook_storage::branches::delete(&state.pool, &owner, &name, &branch_name).await?;
    state.manager.remove(&branch.session_key()).await;

    if let Some(task) = &branch.task {
        cook_storage::tasks::set_status(&state.pool, &task.repo_owner, &task.repo_name, &task.slug, cook_core::TaskStatus::Open).await?;
    }

    Ok(Json(branch.into()))
}

#[cfg(test)]
#[path = "branches_tests.rs"]
mod tests;
