//! CLI smoke tests for loom.
//!
//! These tests run the binary against throwaway projects. None of them spawn
//! ninja: builds either have nothing to do or use `--no-execute`.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn loom_cmd() -> Command {
  cargo_bin_cmd!("loom")
}

/// Create a temp project with a root build script.
fn temp_project(script: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("build.loom.lua"), script).unwrap();
  temp
}

const COMMAND_PROJECT: &str = r#"
project.name = "app"
local gen = project:task("gen", "command")
gen:set("command.commands", { { "touch", "$out" } })
gen:set("command.outputs", { "stamp" })

local docs = project:task("docs", "command")
docs:set("command.commands", { { "touch", "$out" } })
docs:set("command.outputs", { "docs.stamp" })
docs:set("command.explicit", true)

project:task("group"):depends(gen)
"#;

const EMPTY_PROJECT: &str = r#"
project.name = "app"
project:task("group")
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  loom_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  loom_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("loom"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["configure", "build", "targets", "info"] {
    loom_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn info_shows_platform() {
  loom_cmd()
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("Platform:"));
}

// =============================================================================
// configure
// =============================================================================

#[test]
fn configure_writes_build_file() {
  let temp = temp_project(COMMAND_PROJECT);

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("configure")
    .assert()
    .success()
    .stdout(predicate::str::contains("Actions: 2"));

  let text = std::fs::read_to_string(temp.path().join("build/build.ninja")).unwrap();
  assert!(text.starts_with("# loom-options: "));
  assert!(text.contains("rule app.gen.run"));
}

#[test]
fn configure_respects_build_directory_option() {
  let temp = temp_project(COMMAND_PROJECT);

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["-O", "loom.build_directory=out"])
    .arg("configure")
    .assert()
    .success();

  assert!(temp.path().join("out/build.ninja").is_file());
}

#[test]
fn configure_reads_settings_file() {
  let temp = temp_project(COMMAND_PROJECT);
  std::fs::write(temp.path().join(".loom-settings.toml"), "[loom]\nbuild_file = \"main.ninja\"\n").unwrap();

  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();

  assert!(temp.path().join("build/main.ninja").is_file());
}

#[test]
fn configure_unknown_target_fails() {
  let temp = temp_project(COMMAND_PROJECT);

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("configure")
    .arg("app:missing")
    .assert()
    .failure()
    .stderr(predicate::str::contains("app:missing"));

  assert!(!temp.path().join("build/build.ninja").exists());
}

#[test]
fn configure_without_script_fails() {
  let temp = TempDir::new().unwrap();

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("configure")
    .assert()
    .failure()
    .stderr(predicate::str::contains("build.loom.lua"));
}

#[test]
fn configure_reports_script_errors() {
  let temp = temp_project("project:task('bad name')");

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("configure")
    .assert()
    .failure()
    .stderr(predicate::str::contains("bad name"));
}

// =============================================================================
// targets
// =============================================================================

#[test]
fn targets_lists_cache() {
  let temp = temp_project(COMMAND_PROJECT);
  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("targets")
    .assert()
    .success()
    .stdout(predicate::str::contains("app:gen [plain]"))
    .stdout(predicate::str::contains("app:docs [plain] (explicit)"))
    .stdout(predicate::str::contains("app:group [plain]"));
}

#[test]
fn targets_json_output() {
  let temp = temp_project(COMMAND_PROJECT);
  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();

  let output = loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["targets", "--output", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());
  let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(rows.as_array().unwrap().len(), 3);
}

#[test]
fn targets_without_build_file_fails() {
  let temp = temp_project(COMMAND_PROJECT);

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("targets")
    .assert()
    .failure()
    .stderr(predicate::str::contains("loom configure"));
}

// =============================================================================
// build
// =============================================================================

#[test]
fn build_without_cache_reconfigures() {
  let temp = temp_project(COMMAND_PROJECT);

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["build", "--no-execute"])
    .assert()
    .success()
    .stdout(predicate::str::contains("reconfiguring"));
}

#[test]
fn build_with_fresh_cache_skips_scripts() {
  let temp = temp_project(COMMAND_PROJECT);
  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["build", "--no-execute", "gen"])
    .assert()
    .success()
    .stdout(predicate::str::contains("running ninja"));
}

#[test]
fn build_with_changed_options_reconfigures() {
  let temp = temp_project(COMMAND_PROJECT);
  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["-O", "cc.debug=yes", "build", "--no-execute", "gen"])
    .assert()
    .success()
    .stdout(predicate::str::contains("reconfiguring"));
}

#[test]
fn build_with_changed_script_reconfigures() {
  let temp = temp_project(COMMAND_PROJECT);
  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();
  std::fs::write(temp.path().join("build.loom.lua"), EMPTY_PROJECT).unwrap();

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["build", "--no-execute", "gen"])
    .assert()
    .success()
    .stdout(predicate::str::contains("reconfiguring"));
}

#[test]
fn build_with_nothing_to_do() {
  let temp = temp_project(EMPTY_PROJECT);
  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("nothing to do"));
}

#[test]
fn build_group_runs_ninja_for_its_dependency() {
  let temp = temp_project(COMMAND_PROJECT);
  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["build", "--no-execute", "group"])
    .assert()
    .success()
    .stdout(predicate::str::contains("running ninja"));
}

#[test]
fn build_all_with_idle_targets_runs_ninja() {
  let temp = temp_project(&format!("{}
project:task(\"idle\")\n", COMMAND_PROJECT));
  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["build", "--no-execute"])
    .assert()
    .success()
    .stdout(predicate::str::contains("running ninja"));
}

#[test]
fn build_with_changed_settings_reconfigures() {
  let temp = temp_project(COMMAND_PROJECT);
  loom_cmd().arg("-C").arg(temp.path()).arg("configure").assert().success();
  std::fs::write(temp.path().join(".loom-settings.toml"), "[cc]\ndebug = true\n").unwrap();

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .args(["build", "--no-execute", "gen"])
    .assert()
    .success()
    .stdout(predicate::str::contains("reconfiguring"));
}

#[test]
fn build_with_changed_module_reconfigures() {
  let temp = temp_project(
    r#"
project.name = "app"
local helper = require("helper")
local gen = project:task("gen", "command")
gen:set("command.commands", { { "touch", "$out" } })
gen:set("command.outputs", { helper.output })
"#,
  );
  let modules = temp.path().join("modules");
  std::fs::create_dir_all(&modules).unwrap();
  std::fs::write(modules.join("helper.lua"), "return { output = 'stamp' }").unwrap();

  let build = |expected: &str| {
    loom_cmd()
      .arg("-C")
      .arg(temp.path())
      .arg("-P")
      .arg(&modules)
      .args(["build", "--no-execute", "gen"])
      .assert()
      .success()
      .stdout(predicate::str::contains(expected.to_string()));
  };

  loom_cmd()
    .arg("-C")
    .arg(temp.path())
    .arg("-P")
    .arg(&modules)
    .arg("configure")
    .assert()
    .success();
  build("running ninja");

  std::fs::write(modules.join("helper.lua"), "return { output = 'other' }").unwrap();
  build("reconfiguring");
}
