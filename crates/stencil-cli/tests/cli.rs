//! End-to-end tests for the `stencil` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().expect("Failed to create temp dir");
    fs::write(
        dir.path().join("stencil.yaml"),
        "sources:\n  root: views\n  pattern: \"*.hbs\"\n",
    )
    .unwrap();
    for (relative, contents) in files {
        let path = dir.path().join("views").join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

fn stencil(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stencil").unwrap();
    cmd.current_dir(dir)
        .env_remove("STENCIL_CONFIG")
        .env_remove("STENCIL_ROOT")
        .env_remove("RUST_LOG")
        .arg("-q");
    cmd
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("stencil")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn list_prints_registered_templates() {
    let dir = project(&[("home/index.hbs", "hi"), ("layout.hbs", "{{{body}}}")]);

    stencil(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("/home/index.hbs"))
        .stdout(predicate::str::contains("/layout.hbs"))
        .stdout(predicate::str::contains("physical"));
}

#[test]
fn render_uses_inline_model() {
    let dir = project(&[("greet.hbs", "Hello, {{name}}!")]);

    stencil(dir.path())
        .args(["render", "/greet.hbs", "--model", r#"{"name": "Ann"}"#])
        .assert()
        .success()
        .stdout("Hello, Ann!\n");
}

#[test]
fn render_reads_model_file() {
    let dir = project(&[("greet.hbs", "Hi {{name}}")]);
    fs::write(dir.path().join("model.json"), r#"{"name": "Bo"}"#).unwrap();

    stencil(dir.path())
        .args(["render", "greet.hbs", "--model", "@model.json"])
        .assert()
        .success()
        .stdout("Hi Bo\n");
}

#[test]
fn render_unknown_template_fails() {
    let dir = project(&[("greet.hbs", "hi")]);

    stencil(dir.path())
        .args(["render", "/missing.hbs"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("/missing.hbs"))
        .stderr(predicate::str::contains("stencil list"));
}

#[test]
fn render_rejects_bad_model() {
    let dir = project(&[("greet.hbs", "hi")]);

    stencil(dir.path())
        .args(["render", "/greet.hbs", "--model", "{nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid model JSON"));
}

#[test]
fn check_passes_on_valid_templates() {
    let dir = project(&[("a.hbs", "A {{x}}"), ("b.hbs", "B")]);

    stencil(dir.path()).arg("check").assert().success();
}

#[test]
fn check_reports_diagnostics() {
    let dir = project(&[("good.hbs", "fine"), ("bad.hbs", "@frobnicate\nbody")]);

    stencil(dir.path())
        .arg("check")
        .assert()
        .code(5)
        .stdout(predicate::str::contains("FAIL  /bad.hbs"))
        .stdout(predicate::str::contains("STC0010"))
        .stderr(predicate::str::contains("1 of 2 templates failed"));
}

#[test]
fn root_flag_overrides_config() {
    let dir = project(&[]);
    let other = dir.path().join("other");
    fs::create_dir_all(&other).unwrap();
    fs::write(other.join("x.hbs"), "x").unwrap();

    stencil(dir.path())
        .args(["--root", "other", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/x.hbs"));
}

#[test]
fn malformed_dotenv_is_reported() {
    let dir = project(&[("a.hbs", "A")]);
    fs::write(dir.path().join(".env"), "this is not an assignment\n").unwrap();

    stencil(dir.path())
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(".env"));
}
