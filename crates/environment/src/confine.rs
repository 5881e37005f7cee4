// SPDX-License-Identifier: MIT

//! Path confinement shared by backends whose file I/O touches a real
//! filesystem path (local, and container's host-side bind mount). Rejects
//! absolute paths, `..` segments, and symlinks that would resolve outside
//! the working directory root.

use std::path::{Path, PathBuf};

use crate::backend::EnvironmentError;

/// Resolve `requested` relative to `root`, rejecting any result that
/// isn't a descendant of `root` once both are canonicalized.
pub fn confine(root: &Path, requested: &str) -> Result<PathBuf, EnvironmentError> {
    let cleaned = clean_relative(requested);
    let candidate = root.join(&cleaned);

    let root_real = root.canonicalize().map_err(|e| EnvironmentError::Io(format!("{}: {e}", root.display())))?;

    // The leaf component may not exist yet (a file about to be written);
    // canonicalize its parent instead and rejoin the leaf.
    let real = match candidate.canonicalize() {
        Ok(real) => real,
        Err(_) => {
            let parent = candidate.parent().unwrap_or(&candidate);
            let parent_real =
                parent.canonicalize().map_err(|e| EnvironmentError::Io(format!("{}: {e}", parent.display())))?;
            match candidate.file_name() {
                Some(name) => parent_real.join(name),
                None => parent_real,
            }
        }
    };

    if !real.starts_with(&root_real) {
        return Err(EnvironmentError::PathEscape(requested.to_string()));
    }
    Ok(real)
}

/// Resolve `requested` relative to `root` for a write that may target a
/// path that doesn't exist yet. [`confine`] requires the leaf's parent to
/// already exist; this confines against `root` itself instead, using the
/// same string-level `..`-popping [`clean_relative`] does so `requested`
/// can never walk above `root` regardless of what exists on disk, then
/// re-checks containment once the result is joined to `root`'s real path.
pub fn confine_for_write(root: &Path, requested: &str) -> Result<PathBuf, EnvironmentError> {
    match confine(root, requested) {
        Ok(resolved) => Ok(resolved),
        Err(EnvironmentError::Io(_)) => {
            let root_real = root.canonicalize().map_err(|e| EnvironmentError::Io(format!("{}: {e}", root.display())))?;
            let cleaned = clean_relative(requested);
            let candidate = root_real.join(&cleaned);
            if !candidate.starts_with(&root_real) {
                return Err(EnvironmentError::PathEscape(requested.to_string()));
            }
            Ok(candidate)
        }
        Err(other) => Err(other),
    }
}

/// Strip a leading `/` and collapse `.`/`..` segments without touching the
/// filesystem, so `../../etc/passwd` becomes `etc/passwd` rather than
/// escaping — the canonicalize-and-check step in [`confine`] is the real
/// guard; this just keeps `root.join` from being handed a rooted path.
fn clean_relative(requested: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in Path::new(requested).components() {
        use std::path::Component;
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                out.pop();
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "confine_tests.rs"]
mod tests;
