// SPDX-License-Identifier: MIT

//! Branch / Gate state machine (spec §4.10): `active → {merged, abandoned}`,
//! both terminal. Merge is fast-forward-only and gated on every configured
//! gate having passed at the exact current commit.

use std::path::Path;

use chrono::{DateTime, Utc};
use cook_environment::{EnvironmentBackend, EnvironmentContext, EnvironmentSpec};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CoreError;
use crate::gate::{Gate, GateConfig, GateRun, GateRunStatus};
use crate::git;
use crate::task::TaskRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Active,
    Merged,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub repo_owner: String,
    pub repo_name: String,
    pub name: String,
    pub task: Option<TaskRef>,
    pub base_rev: String,
    pub head_rev: String,
    pub status: BranchStatus,
    pub environment: EnvironmentSpec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of running one gate, ready for the caller to persist as a
/// [`GateRun`] row (core doesn't assign ids or log paths — that's storage's
/// job).
#[derive(Debug, Clone)]
pub struct GateRunOutcome {
    pub status: GateRunStatus,
    pub exit_code: Option<i32>,
    pub output: Vec<u8>,
}

impl Branch {
    /// Construct a new branch pinned to the repository's current master
    /// tip; `base_rev` and `head_rev` start equal (spec §3 invariant).
    pub fn new(
        repo_owner: impl Into<String>,
        repo_name: impl Into<String>,
        name: impl Into<String>,
        task: Option<TaskRef>,
        master_rev: String,
        environment: EnvironmentSpec,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if name.contains('/') {
            return Err(CoreError::InvalidBranchName);
        }
        let now = Utc::now();
        Ok(Self {
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
            name,
            task,
            base_rev: master_rev.clone(),
            head_rev: master_rev,
            status: BranchStatus::Active,
            environment,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn session_key(&self) -> String {
        format!("{}/{}", self.repo_name, self.name)
    }

    /// Provision the branch's environment. If setup fails at any step, any
    /// partially-provisioned environment is torn down and the error is
    /// propagated — the branch itself is never left half-created (spec
    /// §4.10 create).
    pub async fn provision(
        ctx: &EnvironmentContext,
        backend: &mut dyn EnvironmentBackend,
    ) -> Result<(), CoreError> {
        if let Err(e) = backend.setup(ctx).await {
            warn!(branch = %ctx.session_key(), error = %e, "environment setup failed, tearing down");
            let _ = backend.teardown().await;
            return Err(e.into());
        }
        info!(branch = %ctx.session_key(), "environment provisioned");
        Ok(())
    }

    /// Run one gate's shell command in the branch's environment.
    pub async fn run_gate(gate: &Gate, backend: &dyn EnvironmentBackend) -> GateRunOutcome {
        match backend.exec(&gate.command).await {
            Ok(output) => GateRunOutcome { status: GateRunStatus::Passed, exit_code: Some(0), output },
            Err(cook_environment::EnvironmentError::NonZeroExit { bytes, exit_code }) => {
                GateRunOutcome { status: GateRunStatus::Failed, exit_code, output: bytes }
            }
            Err(e) => GateRunOutcome { status: GateRunStatus::Failed, exit_code: None, output: e.to_string().into_bytes() },
        }
    }

    /// Fetch `origin` and rebase the working tree onto `origin/master`.
    /// Only valid while `active`. On success updates `base_rev` to the new
    /// `origin/master` tip and `head_rev` to the rebased HEAD.
    pub fn rebase(&mut self, working_path: &Path) -> Result<(), CoreError> {
        if self.status != BranchStatus::Active {
            return Err(CoreError::BranchNotActive);
        }
        let new_base = git::fetch_origin_master(working_path)?;
        let new_head = git::rebase_onto_origin_master(working_path)?;
        self.base_rev = new_base;
        self.head_rev = new_head;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// All four merge preconditions, checked atomically before any git
    /// action (spec §4.10). `latest_runs` must contain at most the single
    /// latest [`GateRun`] per gate name.
    pub fn check_merge_preconditions(
        &self,
        working_path: &Path,
        gates: &GateConfig,
        latest_runs: &[GateRun],
    ) -> Result<(), CoreError> {
        if self.status != BranchStatus::Active {
            return Err(CoreError::BranchNotActive);
        }
        if gates.gates.is_empty() {
            return Err(CoreError::NoGatesConfigured);
        }
        let current_head = git::head_rev(working_path)?;
        let head_short = short_rev(&current_head);

        for gate in &gates.gates {
            let run = latest_runs.iter().find(|r| r.gate_name == gate.name);
            match run {
                None => return Err(CoreError::GateNotRun(gate.name.clone())),
                Some(run) if run.status != GateRunStatus::Passed => {
                    return Err(CoreError::GateNotPassed(gate.name.clone()));
                }
                Some(run) if run.rev != current_head => {
                    return Err(CoreError::GateStale { gate: gate.name.clone(), head_short: head_short.clone() });
                }
                Some(_) => {}
            }
        }

        let origin_master = git::origin_master_rev(working_path)?;
        if !git::is_ancestor(working_path, &origin_master, &current_head)? {
            return Err(CoreError::BehindMaster);
        }
        Ok(())
    }

    /// Push the working tree's HEAD to the bare repo's `master` (fast
    /// forward only) and mark the branch merged. Callers are responsible
    /// for the surrounding effects spec §4.10 lists (killing the agent
    /// terminal session, tearing down the environment, closing the linked
    /// task) since those cross into `cook-terminal`/`cook-storage`.
    pub fn merge(&mut self, working_path: &Path, gates: &GateConfig, latest_runs: &[GateRun]) -> Result<(), CoreError> {
        self.check_merge_preconditions(working_path, gates, latest_runs)?;
        git::fast_forward_push_master(working_path)?;
        self.head_rev = git::head_rev(working_path)?;
        self.status = BranchStatus::Merged;
        self.updated_at = Utc::now();
        info!(repo = %self.repo_name, branch = %self.name, "branch merged");
        Ok(())
    }

    /// Tear down the environment and mark the branch abandoned. Callers
    /// handle deleting dependent rows (gate runs, agent sessions, terminal
    /// tab records) and re-opening the linked task.
    pub async fn abandon(&mut self, backend: &mut dyn EnvironmentBackend) -> Result<(), CoreError> {
        backend.teardown().await?;
        self.status = BranchStatus::Abandoned;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn short_rev(rev: &str) -> String {
    rev.get(..7).unwrap_or(rev).to_string()
}

#[cfg(test)]
#[path = "branch_tests.rs"]
mod tests;
