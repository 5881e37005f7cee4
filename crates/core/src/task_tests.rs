// SPDX-License-Identifier: MIT

use super::*;
use proptest::prelude::*;

#[test]
fn slugify_lowercases_and_hyphenates() {
    assert_eq!(Task::slugify("Add OAuth Login!!"), "add-oauth-login");
}

#[test]
fn slugify_collapses_runs_of_punctuation() {
    assert_eq!(Task::slugify("foo   ---   bar"), "foo-bar");
}

#[test]
fn slugify_trims_leading_and_trailing_hyphens() {
    assert_eq!(Task::slugify("  !!!hello!!!  "), "hello");
}

#[test]
fn slugify_caps_at_fifty_chars() {
    let title = "x".repeat(200);
    let slug = Task::slugify(&title);
    assert_eq!(slug.len(), MAX_SLUG_LEN);
}

#[test]
fn slugify_is_idempotent() {
    let once = Task::slugify("Some Task Title With Lots Of Words In It Too");
    let twice = Task::slugify(&once);
    assert_eq!(once, twice);
}

#[test]
fn slugify_empty_title_yields_empty_slug() {
    assert_eq!(Task::slugify("   ---   "), "");
}

#[test]
fn is_blocked_true_when_any_dependency_not_closed() {
    assert!(Task::is_blocked(&[TaskStatus::Closed, TaskStatus::Open]));
}

#[test]
fn is_blocked_false_when_all_dependencies_closed() {
    assert!(!Task::is_blocked(&[TaskStatus::Closed, TaskStatus::Closed]));
}

#[test]
fn is_blocked_false_with_no_dependencies() {
    assert!(!Task::is_blocked(&[]));
}

proptest! {
    /// Slug derivation (spec §8): slugifying a slug is a no-op.
    #[test]
    fn slugify_is_idempotent_over_arbitrary_titles(title in ".{0,120}") {
        let once = Task::slugify(&title);
        let twice = Task::slugify(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn slugify_never_exceeds_max_len(title in ".{0,300}") {
        prop_assert!(Task::slugify(&title).len() <= MAX_SLUG_LEN);
    }
}
