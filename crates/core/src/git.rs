// SPDX-License-Identifier: MIT

//! Git plumbing for the Branch/Gate state machine (C10), built on `git2`.
//! These are blocking calls; callers on the tokio runtime dispatch them
//! through `spawn_blocking` (spec §5).

use std::path::Path;

use crate::error::CoreError;

/// 40-char object id of the working tree's current HEAD commit.
pub fn head_rev(working_path: &Path) -> Result<String, CoreError> {
    let repo = git2::Repository::open(working_path)?;
    let head = repo.head()?;
    let oid = head.target().ok_or_else(|| CoreError::Git(git2::Error::from_str("HEAD has no target")))?;
    Ok(oid.to_string())
}

/// Rev of the locally cached `origin/master` remote-tracking ref, without
/// fetching. Used for merge-precondition checks that should reflect the
/// state as of the last explicit fetch/rebase, not implicitly re-fetch.
pub fn origin_master_rev(working_path: &Path) -> Result<String, CoreError> {
    let repo = git2::Repository::open(working_path)?;
    let reference = repo.find_reference("refs/remotes/origin/master")?;
    let oid = reference.target().ok_or_else(|| CoreError::Git(git2::Error::from_str("origin/master has no target")))?;
    Ok(oid.to_string())
}

/// Fetch `origin` and return the (possibly updated) rev of `origin/master`.
pub fn fetch_origin_master(working_path: &Path) -> Result<String, CoreError> {
    let repo = git2::Repository::open(working_path)?;
    let mut remote = repo.find_remote("origin")?;
    remote.fetch(&["master"], None, None)?;
    let reference = repo.find_reference("refs/remotes/origin/master")?;
    let oid = reference.target().ok_or_else(|| CoreError::Git(git2::Error::from_str("origin/master has no target")))?;
    Ok(oid.to_string())
}

/// True if `ancestor` is an ancestor of (or equal to) `descendant`.
pub fn is_ancestor(working_path: &Path, ancestor: &str, descendant: &str) -> Result<bool, CoreError> {
    let repo = git2::Repository::open(working_path)?;
    let a = git2::Oid::from_str(ancestor)?;
    let d = git2::Oid::from_str(descendant)?;
    if a == d {
        return Ok(true);
    }
    Ok(repo.graph_descendant_of(d, a)?)
}

/// Rebase HEAD onto `origin/master` in the working tree. On the first
/// conflicting commit, aborts the rebase and returns an error describing
/// the conflicting path; on success returns the new HEAD rev.
pub fn rebase_onto_origin_master(working_path: &Path) -> Result<String, CoreError> {
    let repo = git2::Repository::open(working_path)?;
    let onto_ref = repo.find_reference("refs/remotes/origin/master")?;
    let onto = repo.reference_to_annotated_commit(&onto_ref)?;

    let mut rebase = repo.rebase(None, None, Some(&onto), None)?;
    let sig = git2::Signature::now("cook", "cook@localhost")?;
    while let Some(op) = rebase.next() {
        let op = op?;
        if repo.index()?.has_conflicts() {
            let conflicted: Vec<String> = repo
                .index()?
                .conflicts()?
                .filter_map(|c| c.ok())
                .filter_map(|c| c.our.or(c.their))
                .filter_map(|entry| std::str::from_utf8(&entry.path).ok().map(str::to_string))
                .collect();
            rebase.abort()?;
            return Err(CoreError::RebaseConflict(conflicted.join(", ")));
        }
        rebase.commit(None, &sig, None).map_err(|e| {
            let _ = rebase.abort();
            CoreError::Git(e)
        })?;
        let _ = op;
    }
    rebase.finish(Some(&sig))?;

    head_rev(working_path)
}

/// Fast-forward the bare repo's `master` to the working tree's current
/// HEAD by pushing. Fails (not force) if the bare `master` isn't an
/// ancestor of HEAD.
pub fn fast_forward_push_master(working_path: &Path) -> Result<(), CoreError> {
    let repo = git2::Repository::open(working_path)?;
    let head = repo.head()?;
    let head_ref_name = head.name().ok_or_else(|| CoreError::Git(git2::Error::from_str("HEAD is detached")))?.to_string();
    let mut remote = repo.find_remote("origin")?;
    remote.push(&[format!("{head_ref_name}:refs/heads/master")], None)?;
    Ok(())
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
