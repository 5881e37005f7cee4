// SPDX-License-Identifier: MIT

use super::*;
use crate::repository::Repository as CookRepository;

fn commit_file(repo: &git2::Repository, path: &str, contents: &[u8], message: &str) -> git2::Oid {
    std::fs::write(repo.workdir().unwrap().join(path), contents).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("tester", "tester@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap()
}

fn fixture() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let bare_path = root.path().join("bare.git");
    CookRepository::create_bare(&bare_path).unwrap();
    let working_path = root.path().join("work");
    git2::Repository::clone(bare_path.to_string_lossy().as_ref(), &working_path).unwrap();
    (root, bare_path, working_path)
}

#[test]
fn head_rev_matches_cloned_master() {
    let (_root, bare_path, working_path) = fixture();
    let rev = head_rev(&working_path).unwrap();
    assert_eq!(rev, CookRepository::master_rev(&bare_path).unwrap());
}

#[test]
fn fetch_origin_master_round_trips_after_bare_side_update() {
    let (_root, bare_path, working_path) = fixture();
    // A second clone commits and pushes, simulating someone else moving master.
    let root2 = tempfile::tempdir().unwrap();
    let other = git2::Repository::clone(bare_path.to_string_lossy().as_ref(), root2.path()).unwrap();
    let new_oid = commit_file(&other, "a.txt", b"a", "add a");
    let mut origin = other.find_remote("origin").unwrap();
    origin.push(&["refs/heads/master:refs/heads/master"], None).unwrap();

    let fetched = fetch_origin_master(&working_path).unwrap();
    assert_eq!(fetched, new_oid.to_string());
}

#[test]
fn is_ancestor_true_for_self() {
    let (_root, _bare_path, working_path) = fixture();
    let rev = head_rev(&working_path).unwrap();
    assert!(is_ancestor(&working_path, &rev, &rev).unwrap());
}

#[test]
fn fast_forward_push_master_advances_bare_tip() {
    let (_root, bare_path, working_path) = fixture();
    let repo = git2::Repository::open(&working_path).unwrap();
    let new_oid = commit_file(&repo, "b.txt", b"b", "add b");

    fast_forward_push_master(&working_path).unwrap();
    assert_eq!(CookRepository::master_rev(&bare_path).unwrap(), new_oid.to_string());
}

#[test]
fn rebase_onto_origin_master_replays_local_commit_on_new_tip() {
    let (_root, bare_path, working_path) = fixture();

    // Someone else advances master on the bare repo.
    let root2 = tempfile::tempdir().unwrap();
    let other = git2::Repository::clone(bare_path.to_string_lossy().as_ref(), root2.path()).unwrap();
    commit_file(&other, "upstream.txt", b"upstream", "upstream change");
    other.find_remote("origin").unwrap().push(&["refs/heads/master:refs/heads/master"], None).unwrap();

    // Local working tree makes its own commit before rebasing.
    let repo = git2::Repository::open(&working_path).unwrap();
    commit_file(&repo, "local.txt", b"local", "local change");

    fetch_origin_master(&working_path).unwrap();
    let new_head = rebase_onto_origin_master(&working_path).unwrap();

    let upstream_rev = fetch_origin_master(&working_path).unwrap();
    assert!(is_ancestor(&working_path, &upstream_rev, &new_head).unwrap());
    assert!(working_path.join("local.txt").exists());
    assert!(working_path.join("upstream.txt").exists());
}

#[test]
fn rebase_onto_origin_master_aborts_on_conflict() {
    let (_root, bare_path, working_path) = fixture();

    let root2 = tempfile::tempdir().unwrap();
    let other = git2::Repository::clone(bare_path.to_string_lossy().as_ref(), root2.path()).unwrap();
    commit_file(&other, "shared.txt", b"upstream version", "upstream edits shared.txt");
    other.find_remote("origin").unwrap().push(&["refs/heads/master:refs/heads/master"], None).unwrap();

    let repo = git2::Repository::open(&working_path).unwrap();
    commit_file(&repo, "shared.txt", b"local version", "local edits shared.txt");

    fetch_origin_master(&working_path).unwrap();
    let result = rebase_onto_origin_master(&working_path);
    assert!(matches!(result, Err(CoreError::RebaseConflict(_))));
}
