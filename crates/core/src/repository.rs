// SPDX-License-Identifier: MIT

//! Repository (spec §3): owner identity + name + on-disk bare git
//! directory. Created on demand, template-seeded so a `master` ref always
//! exists; immutable once created.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    pub fn bare_path(roots: &Path, owner: &str, name: &str) -> PathBuf {
        roots.join(owner).join(format!("{name}.git"))
    }

    /// Initialize a fresh bare repository at `bare_path` with an initial
    /// empty commit on `master`, so every repository has a master tip new
    /// branches can fork from. Errors if the path already exists.
    pub fn create_bare(bare_path: &Path) -> Result<(), CoreError> {
        if bare_path.exists() {
            return Err(CoreError::RepositoryExists);
        }
        std::fs::create_dir_all(bare_path)?;
        let mut init_opts = git2::RepositoryInitOptions::new();
        init_opts.bare(true).initial_head("refs/heads/master");
        let bare = git2::Repository::init_opts(bare_path, &init_opts)?;

        // Seed `master` via a scratch working tree so the bare repo starts
        // with a real commit instead of an unborn branch.
        let scratch = tempfile::tempdir()?;
        let seed = git2::Repository::clone(bare_path.to_string_lossy().as_ref(), scratch.path())?;
        std::fs::write(scratch.path().join(".gitkeep"), b"")?;
        let mut index = seed.index()?;
        index.add_path(Path::new(".gitkeep"))?;
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = seed.find_tree(tree_id)?;
        let sig = git2::Signature::now("cook", "cook@localhost")?;
        seed.commit(Some("refs/heads/master"), &sig, &sig, "initial commit", &tree, &[])?;

        let mut origin = seed.find_remote("origin")?;
        origin.push(&["refs/heads/master:refs/heads/master"], None)?;

        // A bare repo has no working tree to check out to, so set HEAD
        // explicitly rather than relying on push to update it.
        bare.set_head("refs/heads/master")?;
        Ok(())
    }

    pub fn master_rev(bare_path: &Path) -> Result<String, CoreError> {
        let repo = git2::Repository::open_bare(bare_path)?;
        let reference = repo.find_branch("master", git2::BranchType::Local)?;
        let oid = reference.get().target().ok_or_else(|| CoreError::Git(git2::Error::from_str("master has no target")))?;
        Ok(oid.to_string())
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
