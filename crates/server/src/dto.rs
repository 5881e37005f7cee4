// SPDX-License-Identifier: MIT

//! Request/response bodies for the JSON API (spec §4.11).

use chrono::{DateTime, Utc};
use cook_core::{Branch, BranchStatus, Task, TaskRef, TaskStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub dependencies: Vec<TaskRefDto>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskRefDto {
    pub repo_owner: String,
    pub repo_name: String,
    pub slug: String,
}

impl From<TaskRefDto> for TaskRef {
    fn from(dto: TaskRefDto) -> Self {
        TaskRef { repo_owner: dto.repo_owner, repo_name: dto.repo_name, slug: dto.slug }
    }
}

impl From<TaskRef> for TaskRefDto {
    fn from(r: TaskRef) -> Self {
        TaskRefDto { repo_owner: r.repo_owner, repo_name: r.repo_name, slug: r.slug }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub repo_owner: String,
    pub repo_name: String,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub priority: i32,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskRefDto>,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskResponse {
    pub fn new(task: Task, blocked: bool) -> Self {
        Self {
            repo_owner: task.repo_owner,
            repo_name: task.repo_name,
            slug: task.slug,
            title: task.title,
            body: task.body,
            priority: task.priority,
            status: task.status,
            dependencies: task.dependencies.into_iter().map(TaskRefDto::from).collect(),
            blocked,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Which backend to provision a new branch's environment with.
#[derive(Debug, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CreateBranchRequest {
    Local,
    Container,
    Remote,
}

#[derive(Debug, Deserialize)]
pub struct CreateBranchBody {
    #[serde(default)]
    pub task: Option<TaskRefDto>,
    #[serde(default)]
    pub dotfiles_url: Option<String>,
    #[serde(flatten)]
    pub backend: CreateBranchRequest,
}

#[derive(Debug, Serialize)]
pub struct BranchResponse {
    pub repo_owner: String,
    pub repo_name: String,
    pub name: String,
    pub task: Option<TaskRefDto>,
    pub base_rev: String,
    pub head_rev: String,
    pub status: BranchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Branch> for BranchResponse {
    fn from(b: Branch) -> Self {
        Self {
            repo_owner: b.repo_owner,
            repo_name: b.repo_name,
            name: b.name,
            task: b.task.map(TaskRefDto::from),
            base_rev: b.base_rev,
            head_rev: b.head_rev,
            status: b.status,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GateRunResponse {
    pub gate: String,
    pub status: cook_core::GateRunStatus,
    pub exit_code: Option<i32>,
}
