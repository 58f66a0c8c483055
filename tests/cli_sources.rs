// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! End-to-end tests for `tugcheck sources`.
//!
//! These run the built binary inside a temporary directory so relative
//! arguments resolve the way they do for a user at a shell prompt.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

fn tugcheck(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tugcheck"));
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
}

fn layout() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "pkg/__init__.py", "");
    write(tmp.path(), "pkg/a.py", "def f(x): ...\n");
    write(tmp.path(), "pkg/a.pyi", "def f(x: int) -> int: ...\n");
    write(tmp.path(), "a.py", "");
    tmp
}

#[test]
fn relative_file_resolves_against_current_directory() {
    let tmp = layout();
    let json = json_stdout(tugcheck(tmp.path()).args(["sources", "a.py"]));
    assert_eq!(json["status"], "ok");
    assert_eq!(json["count"], 1);
    assert_eq!(json["sources"][0]["path"], "a.py");
    assert_eq!(json["sources"][0]["module"], "a");
    assert_eq!(json["sources"][0]["base_dir"], ".");
}

#[test]
fn merge_stubs_flag_pairs_files() {
    let tmp = layout();
    let json = json_stdout(tugcheck(tmp.path()).args(["sources", "--merge-stubs", "pkg"]));
    assert_eq!(json["count"], 2);
    assert_eq!(json["paired"], 1);
    assert_eq!(json["sources"][0]["module"], "pkg");
    assert_eq!(json["sources"][1]["module"], "pkg.a");
    assert_eq!(json["sources"][1]["path"], "pkg/a.py");
    assert_eq!(json["sources"][1]["stub"]["path"], "pkg/a.pyi");
    assert_eq!(json["sources"][1]["base_dir"], ".");
}

#[test]
fn config_file_turns_on_merging() {
    let tmp = layout();
    write(
        tmp.path(),
        ".tugcheck/config.toml",
        "[sources]\nmerge_stub_into_src = true\n",
    );
    let json = json_stdout(tugcheck(tmp.path()).args(["sources", "pkg/a.py"]));
    assert_eq!(json["paired"], 1);
    assert_eq!(json["sources"][0]["stub"]["module"], "pkg.a");
}

#[test]
fn configured_package_roots_resolve_against_the_project_root() {
    let tmp = layout();
    write(
        tmp.path(),
        ".tugcheck/config.toml",
        "[sources]\npackage_roots = [\"ns\"]\n",
    );
    write(tmp.path(), "ns/pkg/a.py", "");
    let json = json_stdout(tugcheck(&tmp.path().join("ns")).args(["sources", "pkg/a.py"]));
    assert_eq!(json["sources"][0]["module"], "pkg.a");
    assert_eq!(json["sources"][0]["base_dir"], ".");
}

#[test]
fn absolute_package_root_flag_is_honored() {
    let tmp = layout();
    write(tmp.path(), "ns/pkg/a.py", "");
    let root = tmp.path().join("ns").display().to_string();
    let json = json_stdout(tugcheck(tmp.path()).args([
        "sources",
        "--package-root",
        root.as_str(),
        "ns/pkg/a.py",
    ]));
    assert_eq!(json["sources"][0]["module"], "pkg.a");
    assert_eq!(json["sources"][0]["base_dir"], "ns");
}

#[test]
fn current_directory_lists_top_level_modules() {
    let tmp = layout();
    let json = json_stdout(tugcheck(tmp.path()).args(["sources", "."]));
    let modules: Vec<&str> = json["sources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["module"].as_str().unwrap())
        .collect();
    assert_eq!(modules, vec!["a", "pkg", "pkg.a"]);
}

#[test]
fn text_format_prints_one_line_per_source() {
    let tmp = layout();
    let output = tugcheck(tmp.path())
        .args(["sources", "--merge-stubs", "--format", "text", "pkg/a.py", "run"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "pkg.a pkg/a.py pkg/a.pyi\n- run\n"
    );
}

#[test]
fn empty_directory_exits_with_invalid_arguments() {
    let tmp = layout();
    fs::create_dir(tmp.path().join("docs")).unwrap();
    let assert = tugcheck(tmp.path()).args(["sources", "docs"]).assert();
    let assert = assert.code(2);
    let json: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["code"], 2);
    assert_eq!(json["error"]["details"]["path"], "docs");
}

#[test]
fn invalid_package_name_exits_with_invalid_arguments() {
    let tmp = layout();
    write(tmp.path(), "bad-pkg/__init__.py", "");
    write(tmp.path(), "bad-pkg/mod.py", "");
    tugcheck(tmp.path())
        .args(["sources", "bad-pkg/mod.py"])
        .assert()
        .code(2);
}

#[test]
fn missing_paths_is_a_usage_error() {
    let tmp = layout();
    tugcheck(tmp.path()).arg("sources").assert().failure();
}
