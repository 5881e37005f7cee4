// SPDX-License-Identifier: MIT

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use cook_core::{CoreError, Repository};

use crate::error::CookError;
use crate::state::Store;

pub async fn create_repo(
    State(state): State<Arc<Store>>,
    Path((owner, name)): Path<(String, String)>,
) -> Result<Json<Repository>, CookError> {
    if cook_storage::repositories::exists(&state.pool, &owner, &name).await? {
        return Err(CoreError::RepositoryExists.into());
    }

    let bare_path = state.bare_repo_path(&owner, &name);
    tokio::task::spawn_blocking(move || Repository::create_bare(&bare_path))
        .await
        .map_err(|e| CookError::internal(e.to_string()))??;

    let repo = cook_storage::repositories::insert(&state.pool, &owner, &name).await?;
    Ok(Json(repo))
}

#[cfg(test)]
#[path = "repos_tests.rs"]
mod tests;
