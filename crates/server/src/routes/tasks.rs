// SPDX-License-Identifier: MIT

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::dto::{CreateTaskRequest, TaskResponse};
use crate::error::CookError;
use crate::state::Store;

pub async fn create_task(
    State(state): State<Arc<Store>>,
    Path((owner, name)): Path<(String, String)>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Json<TaskResponse>, CookError> {
    let dependencies: Vec<_> = body.dependencies.into_iter().map(Into::into).collect();
    let task = cook_storage::tasks::insert(&state.pool, &owner, &name, &body.title, &body.body, body.priority, &dependencies).await?;
    Ok(Json(TaskResponse::new(task, false)))
}

pub async fn get_task(
    State(state): State<Arc<Store>>,
    Path((owner, name, slug)): Path<(String, String, String)>,
) -> Result<Json<TaskResponse>, CookError> {
    let task = cook_storage::tasks::get(&state.pool, &owner, &name, &slug)
        .await?
        .ok_or_else(|| cook_core::CoreError::TaskNotFound)?;
    let statuses = cook_storage::tasks::dependency_statuses(&state.pool, &task).await?;
    let blocked = cook_core::Task::is_blocked(&statuses);
    Ok(Json(TaskResponse::new(task, blocked)))
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
