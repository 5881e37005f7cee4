// SPDX-License-Identifier: MIT

use cook_environment::EnvironmentError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("repository already exists")]
    RepositoryExists,
    #[error("repository not found")]
    RepositoryNotFound,
    #[error("task slug collision")]
    TaskExists,
    #[error("task not found")]
    TaskNotFound,
    #[error("branch name must not contain '/'")]
    InvalidBranchName,
    #[error("branch already exists")]
    BranchExists,
    #[error("branch not found")]
    BranchNotFound,
    #[error("branch is not active")]
    BranchNotActive,
    #[error("no gates configured for this repository")]
    NoGatesConfigured,
    #[error("gate '{0}' has not been run")]
    GateNotRun(String),
    #[error("gate '{0}' has not passed")]
    GateNotPassed(String),
    #[error("gate '{gate}' is stale vs {head_short}")]
    GateStale { gate: String, head_short: String },
    #[error("branch is behind master")]
    BehindMaster,
    #[error("rebase failed: {0}")]
    RebaseConflict(String),
    #[error("environment error: {0}")]
    Environment(#[from] EnvironmentError),
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
    #[error("gate config error: {0}")]
    GateConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
