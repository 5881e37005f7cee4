// SPDX-License-Identifier: MIT

//! Task data model (spec §3): identified by `(repository, slug)`, with a
//! blocked/unblocked status derived from its dependency list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_SLUG_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    NeedsHuman,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub repo_owner: String,
    pub repo_name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub repo_owner: String,
    pub repo_name: String,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub priority: i32,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Lowercase, collapse runs of non-alphanumerics to a single hyphen,
    /// trim leading/trailing hyphens, cap at 50 chars. Applying this twice
    /// to its own output is a no-op.
    pub fn slugify(title: &str) -> String {
        let mut slug = String::with_capacity(title.len());
        let mut last_was_hyphen = false;
        for ch in title.chars().flat_map(char::to_lowercase) {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch);
                last_was_hyphen = false;
            } else if !last_was_hyphen && !slug.is_empty() {
                slug.push('-');
                last_was_hyphen = true;
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
        slug
    }

    /// Blocked iff any dependency is not yet `closed`. Callers pass in the
    /// resolved statuses of `self.dependencies` in order; a task with no
    /// dependencies is never blocked.
    pub fn is_blocked(dependency_statuses: &[TaskStatus]) -> bool {
        dependency_statuses.iter().any(|s| *s != TaskStatus::Closed)
    }

    /// Called when the branch that implements this task merges.
    pub fn close(&mut self) {
        self.status = TaskStatus::Closed;
        self.updated_at = Utc::now();
    }

    /// Called when the branch that implements this task is abandoned.
    pub fn reopen(&mut self) {
        self.status = TaskStatus::Open;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
