//! The canonical walkthroughs of the resolution pipeline.

use pawnpm_cli::core::PawnpmError;
use pawnpm_cli::dependency::{Constraint, Dependency, parse_specifier, parse_with_overrides};
use pawnpm_cli::lockfile::{LockFile, LockedDependency};
use pawnpm_cli::overrides::OverrideTable;
use pawnpm_cli::pinner::TaglessPinner;
use pawnpm_cli::test_utils::{FakeGit, FakeRepo};

use crate::common::{NoReleases, TestProject};

#[test]
fn test_tag_specifier_parses_to_descriptor() {
    let dependency = parse_specifier("user/repo:1.2.3").unwrap();
    let Dependency::Git(git) = dependency else {
        panic!("expected a git dependency");
    };
    assert_eq!(git.site, "github.com");
    assert!(git.is_default_site());
    assert_eq!(git.owner, "user");
    assert_eq!(git.repo, "repo");
    assert_eq!(git.path, None);
    assert_eq!(git.constraint, Constraint::Tag("1.2.3".to_string()));
}

#[test]
fn test_short_commit_is_rejected() {
    let short = "1234567890abcdef1234567890abcdef1234567";
    assert_eq!(short.len(), 39);

    let err = parse_specifier(&format!("user/repo#{short}")).unwrap_err();
    assert!(matches!(err, PawnpmError::InvalidCommitLength { length: 39 }));
    assert!(err.to_string().contains("39"));
}

#[test]
fn test_override_replacement_version_wins() {
    let mut overrides = OverrideTable::new();
    overrides.insert("old/pkg", "new/pkg:4.22");

    assert_eq!(overrides.rewrite("old/pkg:4.20"), "new/pkg:4.22");
    let dependency = parse_with_overrides("old/pkg:4.20", &overrides).unwrap();
    assert_eq!(dependency.to_string(), "new/pkg:4.22");
}

#[test]
fn test_locked_commit_replaces_tag() {
    let commit = "abc1230000000000000000000000000000000000";
    let mut lockfile = LockFile::new();
    lockfile.insert(
        "github.com/user/repo",
        LockedDependency {
            constraint: ":1.x".to_string(),
            commit: commit.to_string(),
            owner: "user".to_string(),
            repo: "repo".to_string(),
            ..LockedDependency::default()
        },
    );

    let declared = parse_specifier("user/repo:1.x").unwrap();
    let pinned = lockfile.locked_ref_for(&declared).unwrap();
    let git = pinned.git().unwrap();
    assert_eq!(git.owner, "user");
    assert_eq!(git.repo, "repo");
    assert_eq!(git.constraint, Constraint::Commit(commit.to_string()));
    assert_eq!(git.constraint.tag(), None);
    assert_eq!(git.constraint.branch(), None);
}

#[tokio::test]
async fn test_pinner_selects_highest_cached_tag() {
    let git = FakeGit::new();
    git.add_repo(
        FakeRepo::new("user", "repo")
            .with_commit("first")
            .with_tag("1.0.0")
            .with_commit("second")
            .with_tag("2.0.0"),
    );
    let project = TestProject::new(git);
    let mut root = project.write_package(&["user/repo"], &[]);
    let overrides = OverrideTable::new();

    let pinned = TaglessPinner::new(&project.store, &overrides, &NoReleases)
        .pin_unconstrained(&mut root)
        .await
        .unwrap();

    assert_eq!(pinned.len(), 1);
    assert_eq!(pinned[0].to, "user/repo:2.0.0");
    let reloaded = pawnpm_cli::package::Package::load(&project.dir).unwrap();
    assert_eq!(reloaded.dependencies, vec!["user/repo:2.0.0"]);
    assert_eq!(reloaded.output.as_deref(), Some("gamemodes/main.amx"));
}
