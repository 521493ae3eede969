//! Graph building followed by vendoring, the way `pawnpm ensure` runs them.

use pawnpm_cli::installer::{InstallReport, Installer};
use pawnpm_cli::lockfile::{LockFile, LockfileSession};
use pawnpm_cli::overrides::OverrideTable;
use pawnpm_cli::package::Package;
use pawnpm_cli::resolver::GraphBuilder;
use pawnpm_cli::test_utils::{FakeGit, FakeRepo};
use pawnpm_cli::utils::Platform;

use crate::common::TestProject;

async fn ensure(project: &TestProject, root: &Package, overrides: &OverrideTable, update: bool) -> InstallReport {
    let graph = GraphBuilder::new(&project.store, overrides, &project.dir)
        .platform(Platform::Linux)
        .force_update(update)
        .build(root)
        .await
        .unwrap();
    let mut lock = LockfileSession::open(&project.dir, root.format, true).unwrap();
    if update {
        lock.force_update();
    }
    Installer::new(&project.store, &project.dir)
        .ensure_dependencies(&graph, &mut lock, update)
        .await
        .unwrap()
}

fn upstream() -> FakeGit {
    let git = FakeGit::new();
    git.add_repo(
        FakeRepo::new("pawn-lang", "samp-stdlib")
            .with_file("a_samp.inc", "native print(const string[]);")
            .with_tag("v0.3.7")
            .with_commit("next")
            .with_file("a_samp.inc", "native print(const string[], ...);"),
    );
    git.add_repo(
        FakeRepo::new("user", "lib")
            .with_package(&["pawn-lang/samp-stdlib:0.3.7"])
            .with_file("lib.inc", "#include <a_samp>")
            .with_tag("1.0.0")
            .with_commit("fix")
            .with_tag("1.0.1"),
    );
    git.add_repo(FakeRepo::new("user", "pawntest").with_commit("init").with_tag("0.1.0"));
    git
}

#[tokio::test]
async fn test_ensure_vendors_and_locks_whole_graph() {
    let project = TestProject::new(upstream());
    std::fs::create_dir_all(project.dir.join("plugins/streamer")).unwrap();
    let root = project.write_package(
        &["user/lib:^1.0", "plugin://local/plugins/streamer"],
        &["user/pawntest"],
    );

    let report = ensure(&project, &root, &OverrideTable::new(), false).await;
    assert!(report.is_success(), "{:?}", report.failed);
    assert!(report.lockfile_saved);

    assert!(project.vendored("lib").join("lib.inc").exists());
    assert_eq!(
        std::fs::read_to_string(project.vendored("samp-stdlib").join("a_samp.inc")).unwrap(),
        "native print(const string[]);"
    );
    assert!(project.vendored("pawntest").exists());

    let lockfile = LockFile::load(&project.dir).unwrap().unwrap();
    let lib = &lockfile.dependencies["github.com/user/lib"];
    assert_eq!(lib.resolved, "1.0.1");
    assert_eq!(lib.commit, project.git().commit_of("user", "lib", 1));
    assert!(!lib.transitive);

    let stdlib = &lockfile.dependencies["github.com/pawn-lang/samp-stdlib"];
    assert!(stdlib.transitive);
    assert_eq!(stdlib.resolved, "v0.3.7");
    assert_eq!(stdlib.required_by, vec!["github.com/user/lib"]);

    assert!(lockfile.dependencies.contains_key("plugin://local/plugins/streamer"));
    assert_eq!(lockfile.direct_dependencies().count(), 3);
}

#[tokio::test]
async fn test_second_run_reproduces_locked_commits() {
    let project = TestProject::new(upstream());
    let root = project.write_package(&["user/lib:1.x"], &[]);
    let overrides = OverrideTable::new();
    ensure(&project, &root, &overrides, false).await;
    let first = LockFile::load(&project.dir).unwrap().unwrap();

    // A newer matching release appears upstream
    project.git().add_repo(
        FakeRepo::new("user", "lib")
            .with_package(&["pawn-lang/samp-stdlib:0.3.7"])
            .with_file("lib.inc", "#include <a_samp>")
            .with_tag("1.0.0")
            .with_commit("fix")
            .with_tag("1.0.1")
            .with_commit("feature")
            .with_tag("1.1.0"),
    );

    let report = ensure(&project, &root, &overrides, false).await;
    assert!(report.is_success());
    assert!(!report.lockfile_saved, "an unchanged resolution must not rewrite pawn.lock");
    assert_eq!(LockFile::load(&project.dir).unwrap().unwrap().dependencies, first.dependencies);

    let report = ensure(&project, &root, &overrides, true).await;
    assert!(report.is_success());
    let updated = LockFile::load(&project.dir).unwrap().unwrap();
    assert_eq!(updated.dependencies["github.com/user/lib"].resolved, "1.1.0");
}

#[tokio::test]
async fn test_removed_dependency_is_pruned() {
    let project = TestProject::new(upstream());
    let overrides = OverrideTable::new();
    let root = project.write_package(&["user/lib:1.0.0"], &["user/pawntest"]);
    ensure(&project, &root, &overrides, false).await;

    let root = project.write_package(&["user/lib:1.0.0"], &[]);
    let report = ensure(&project, &root, &overrides, false).await;
    assert_eq!(report.pruned, vec!["github.com/user/pawntest"]);
    assert!(report.lockfile_saved);
    let lockfile = LockFile::load(&project.dir).unwrap().unwrap();
    assert!(!lockfile.dependencies.contains_key("github.com/user/pawntest"));
}

#[tokio::test]
async fn test_overridden_dependency_is_locked_under_new_identity() {
    let git = upstream();
    git.add_repo(FakeRepo::new("AmyrAhmady", "samp-plugin-crashdetect").with_commit("c").with_tag("v4.22"));
    let project = TestProject::new(git);
    let root = project.write_package(&["Zeex/samp-plugin-crashdetect:v4.22"], &[]);

    let report = ensure(&project, &root, &OverrideTable::builtin(), false).await;
    assert!(report.is_success(), "{:?}", report.failed);
    let lockfile = LockFile::load(&project.dir).unwrap().unwrap();
    assert!(lockfile.dependencies.contains_key("github.com/AmyrAhmady/samp-plugin-crashdetect"));
    assert!(!lockfile.dependencies.contains_key("github.com/Zeex/samp-plugin-crashdetect"));
}

#[tokio::test]
async fn test_corrupted_vendor_copy_is_recovered() {
    let project = TestProject::new(upstream());
    let overrides = OverrideTable::new();
    let root = project.write_package(&["user/lib:1.0.0"], &[]);
    ensure(&project, &root, &overrides, false).await;

    project.git().corrupt(&project.vendored("lib"));
    let report = ensure(&project, &root, &overrides, false).await;
    assert!(report.is_success(), "{:?}", report.failed);
    assert!(project.vendored("lib").join(".git").join("objects").exists());
}
