//! Command-line behavior of the `pawnpm` binary.
//!
//! Every command gets its own config and cache directories, and the override feed points at
//! a closed local port so nothing touches the network.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

use crate::common::write_package;

struct Sandbox {
    temp: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("project")).unwrap();
        Self { temp }
    }

    fn project(&self) -> std::path::PathBuf {
        self.temp.path().join("project")
    }

    fn config_dir(&self) -> std::path::PathBuf {
        self.temp.path().join("config")
    }

    fn pawnpm(&self) -> Command {
        let mut cmd = Command::cargo_bin("pawnpm").unwrap();
        cmd.current_dir(self.project())
            .env("PAWNPM_CONFIG_DIR", self.config_dir())
            .env("PAWNPM_CACHE_DIR", self.temp.path().join("cache"))
            .env("PAWNPM_OVERRIDES_URL", "http://127.0.0.1:9/dependency-overrides.json")
            .env("PAWNPM_NO_PROGRESS", "1")
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn write_lockfile(dir: &Path) {
    let lockfile = serde_json::json!({
        "version": 1,
        "generated": "2026-01-01T12:00:00Z",
        "sampctl_version": "0.3.2",
        "dependencies": {
            "github.com/user/lib": {
                "constraint": ":1.x",
                "resolved": "1.4.0",
                "commit": "0123456789abcdef0123456789abcdef01234567",
                "user": "user",
                "repo": "lib"
            },
            "github.com/pawn-lang/samp-stdlib": {
                "constraint": ":0.3.7",
                "resolved": "v0.3.7",
                "commit": "89abcdef0123456789abcdef0123456789abcdef",
                "user": "pawn-lang",
                "repo": "samp-stdlib",
                "transitive": true,
                "required_by": ["github.com/user/lib"]
            }
        }
    });
    std::fs::write(dir.join("pawn.lock"), serde_json::to_vec_pretty(&lockfile).unwrap()).unwrap();
}

#[test]
fn test_help_lists_commands() {
    let sandbox = Sandbox::new();
    sandbox
        .pawnpm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ensure"))
        .stdout(predicate::str::contains("overrides"));
}

#[test]
fn test_ensure_without_definition_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .pawnpm()
        .arg("ensure")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("package definition"));
}

#[test]
fn test_unknown_platform_is_rejected() {
    let sandbox = Sandbox::new();
    write_package(&sandbox.project(), &[], &[]);
    sandbox
        .pawnpm()
        .args(["ensure", "--platform", "macos"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown platform 'macos'"));
}

#[test]
fn test_ensure_with_no_dependencies_succeeds() {
    let sandbox = Sandbox::new();
    write_package(&sandbox.project(), &[], &[]);
    sandbox
        .pawnpm()
        .arg("ensure")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ensured 0 dependencies"));
    assert!(sandbox.project().join("pawn.lock").exists());
}

#[test]
fn test_lock_show_and_clear() {
    let sandbox = Sandbox::new();
    sandbox
        .pawnpm()
        .args(["lock", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No lockfile found"));

    write_lockfile(&sandbox.project());
    sandbox
        .pawnpm()
        .args(["lock", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("github.com/user/lib 1.4.0 (01234567)"))
        .stdout(predicate::str::contains("required by github.com/user/lib"));

    sandbox.pawnpm().args(["lock", "clear"]).assert().success();
    assert!(!sandbox.project().join("pawn.lock").exists());
}

#[test]
fn test_outdated_reports_changed_constraints() {
    let sandbox = Sandbox::new();
    write_package(&sandbox.project(), &["user/lib:2.x"], &[]);
    write_lockfile(&sandbox.project());

    sandbox
        .pawnpm()
        .arg("outdated")
        .assert()
        .success()
        .stdout(predicate::str::contains("user/lib:2.x"))
        .stdout(predicate::str::contains(":1.x"));

    sandbox
        .pawnpm()
        .args(["outdated", "--check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of date"));

    write_package(&sandbox.project(), &["user/lib:1.x"], &[]);
    sandbox
        .pawnpm()
        .args(["outdated", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_overrides_add_list_remove() {
    let sandbox = Sandbox::new();
    sandbox
        .pawnpm()
        .args(["overrides", "add", "old/pkg", "new/pkg:4.22"])
        .assert()
        .success();
    assert!(sandbox.config_dir().join("dependency-overrides.json").exists());

    sandbox
        .pawnpm()
        .args(["overrides", "list", "--local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("old/pkg"))
        .stdout(predicate::str::contains("new/pkg:4.22"));

    // The merged table also carries the built-in redirects
    sandbox
        .pawnpm()
        .args(["overrides", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AmyrAhmady/samp-plugin-crashdetect"))
        .stdout(predicate::str::contains("new/pkg:4.22"));

    sandbox
        .pawnpm()
        .args(["overrides", "remove", "old/pkg"])
        .assert()
        .success();
    sandbox
        .pawnpm()
        .args(["overrides", "remove", "old/pkg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No local override for 'old/pkg'"));
}

#[test]
fn test_overrides_reject_invalid_target() {
    let sandbox = Sandbox::new();
    sandbox
        .pawnpm()
        .args(["overrides", "add", "old/pkg", "new/pkg#abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid override target"));
    sandbox.pawnpm().args(["overrides", "clear-cache"]).assert().success();
}
