//! Invariants of the parser, the override table, the lockfile and the graph walk.

use pawnpm_cli::core::PawnpmError;
use pawnpm_cli::dependency::{Constraint, parse_specifier};
use pawnpm_cli::lockfile::{LockFile, LockfileSession};
use pawnpm_cli::overrides::OverrideTable;
use pawnpm_cli::package::DefinitionFormat;
use pawnpm_cli::resolver::GraphBuilder;
use pawnpm_cli::test_utils::{FakeGit, FakeRepo};

use crate::common::TestProject;

#[test]
fn test_render_reproduces_canonical_specifier() {
    let commit = format!("user/repo#{}", "a".repeat(40));
    let canonical = [
        "user/repo",
        "user/repo:1.2.3",
        "user/repo:^1.2",
        "user/repo@develop",
        "pawn-lang/YSI-Includes/YSI_Core@5.x",
        "gitlab.com/user/repo:v2",
        "plugin://local/plugins/streamer",
        "includes://user/repo:2.0",
        commit.as_str(),
    ];
    for raw in canonical {
        assert_eq!(parse_specifier(raw).unwrap().to_string(), raw, "round trip of {raw}");
    }

    // The default site is dropped when rendering
    assert_eq!(parse_specifier("github.com/user/repo:1.0").unwrap().to_string(), "user/repo:1.0");
    assert_eq!(
        parse_specifier("https://github.com/user/repo").unwrap().to_string(),
        "user/repo"
    );
}

#[test]
fn test_commit_hash_must_be_forty_characters() {
    for length in (1..=80).filter(|l| *l != 40) {
        let raw = format!("user/repo#{}", "f".repeat(length));
        assert!(
            matches!(parse_specifier(&raw), Err(PawnpmError::InvalidCommitLength { .. })),
            "length {length} was accepted"
        );
    }
    assert!(parse_specifier(&format!("user/repo#{}", "f".repeat(40))).is_ok());
}

#[test]
fn test_rewrite_is_idempotent() {
    let mut overrides = OverrideTable::builtin();
    overrides.insert("old/pkg", "new/pkg:4.22");
    overrides.insert("a/one", "b/two");
    overrides.insert("b/two", "c/three");
    overrides.insert("loop/x", "loop/y");
    overrides.insert("loop/y", "loop/x");

    let inputs = [
        "old/pkg",
        "old/pkg:4.20",
        "a/one@main",
        "b/two",
        "loop/x",
        "Zeex/samp-plugin-crashdetect:4.20",
        "github.com/Zeex/samp-plugin-crashdetect",
        "untouched/repo:1.0",
        "plugin://local/plugins/x",
    ];
    for input in inputs {
        let once = overrides.rewrite(input);
        assert_eq!(overrides.rewrite(&once), once, "rewrite of {input} is not stable");
    }
}

#[test]
fn test_lock_pin_beats_any_constraint() {
    let commit = "c".repeat(40);
    let seed = parse_specifier("user/repo:1.0.0").unwrap();
    let temp = tempfile::tempdir().unwrap();
    let mut session = LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Json, LockFile::new());
    session.record_resolution(&seed, &commit, Some("1.0.0"), false, None);
    let lockfile = session.lockfile().unwrap();

    for raw in ["user/repo", "user/repo:2.x", "user/repo@develop", "github.com/user/repo:1.0.0"] {
        let pinned = lockfile.locked_ref_for(&parse_specifier(raw).unwrap()).unwrap();
        assert_eq!(pinned.constraint(), &Constraint::Commit(commit.clone()), "{raw}");
    }
    assert!(lockfile.locked_ref_for(&parse_specifier("other/repo").unwrap()).is_none());
}

#[test]
fn test_outdated_until_relocked() {
    let temp = tempfile::tempdir().unwrap();
    let mut session = LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Json, LockFile::new());
    let v1 = parse_specifier("user/repo:1.x").unwrap();
    let v2 = parse_specifier("user/repo:2.x").unwrap();

    assert!(session.is_outdated(&v1));
    session.record_resolution(&v1, &"1".repeat(40), Some("1.4.0"), false, None);
    assert!(!session.is_outdated(&v1));

    assert!(session.is_outdated(&v2));
    session.record_resolution(&v2, &"2".repeat(40), Some("2.0.1"), false, None);
    assert!(!session.is_outdated(&v2));
    assert!(session.is_outdated(&v1));
}

#[tokio::test]
async fn test_cyclic_graph_terminates_without_duplicates() {
    let git = FakeGit::new();
    git.add_repo(FakeRepo::new("user", "a").with_package(&["user/b"]));
    git.add_repo(FakeRepo::new("user", "b").with_package(&["user/a", "user/c"]));
    git.add_repo(FakeRepo::new("user", "c").with_package(&["user/b", "me/gamemode"]));
    let project = TestProject::new(git);
    let root = project.write_package(&["user/a"], &["user/c"]);
    let overrides = OverrideTable::new();

    let graph = GraphBuilder::new(&project.store, &overrides, &project.dir)
        .build(&root)
        .await
        .unwrap();

    let keys: Vec<String> = graph.dependencies.iter().map(|e| e.key()).collect();
    assert_eq!(
        keys,
        vec!["github.com/user/a", "github.com/user/b", "github.com/user/c"]
    );
    assert_eq!(graph.keys().len(), graph.len());
    assert_eq!(project.git().clone_count(), 3);
}
