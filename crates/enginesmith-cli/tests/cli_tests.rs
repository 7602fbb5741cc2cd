//! Command-line end-to-end tests

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const GRAPH: &str = r#"{
  "Nodes": [
    {
      "Annotation": "Lib_iOS_arm64 build_release/libUIWidgets.a",
      "Action": "\"artifacts/a.o\" \"artifacts/b.o\" -o out",
      "Inputs": []
    },
    {
      "Annotation": "Lib_iOS_arm64 build_debug/libUIWidgets.a",
      "Action": "\"artifacts/debug.o\"",
      "Inputs": []
    },
    {
      "Annotation": "Link_Android_arm64 build_release_arm64/libUIWidgets.so",
      "Action": "clang @artifacts/link.rsp",
      "Inputs": ["artifacts/x.o", "artifacts/link.rsp"]
    }
  ]
}"#;

fn enginesmith() -> Command {
    let mut cmd = Command::cargo_bin("enginesmith").unwrap();
    cmd.env_remove("ENGINESMITH_JSON")
        .env_remove("ENGINESMITH_LOG_JSON")
        .env_remove("RUST_LOG");
    cmd
}

fn graph_file(temp: &TempDir, content: &str) -> PathBuf {
    let path = temp.path().join("tundra.dag.json");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_extract_objects() {
    let temp = TempDir::new().unwrap();
    let graph = graph_file(&temp, GRAPH);

    enginesmith()
        .args(["extract", "objects"])
        .arg(&graph)
        .args(["--prefix", "Lib_iOS_arm64", "--mode", "release"])
        .assert()
        .success()
        .stdout("artifacts/a.o\nartifacts/b.o\n");
}

#[test]
fn test_extract_objects_json() {
    let temp = TempDir::new().unwrap();
    let graph = graph_file(&temp, GRAPH);

    let output = enginesmith()
        .args(["extract", "objects"])
        .arg(&graph)
        .args(["--prefix", "Lib_iOS_arm64", "--mode", "debug", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let objects: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(objects, vec!["artifacts/debug.o"]);
}

#[test]
fn test_extract_rsp() {
    let temp = TempDir::new().unwrap();
    let graph = graph_file(&temp, GRAPH);

    enginesmith()
        .args(["extract", "rsp"])
        .arg(&graph)
        .args(["--prefix", "Link_Android_arm64", "--mode", "release"])
        .assert()
        .success()
        .stdout("artifacts/link.rsp\n");
}

#[test]
fn test_extract_nothing_found_exits_1() {
    let temp = TempDir::new().unwrap();
    let graph = graph_file(&temp, GRAPH);

    enginesmith()
        .args(["extract", "rsp"])
        .arg(&graph)
        .args(["--prefix", "Link_Android_arm32", "--mode", "release"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("no response file found"));
}

#[test]
fn test_extract_missing_graph_exits_1() {
    let temp = TempDir::new().unwrap();

    enginesmith()
        .args(["extract", "objects"])
        .arg(temp.path().join("missing.json"))
        .args(["--prefix", "Lib_iOS_arm64", "--mode", "release"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no object files found"));
}

#[test]
fn test_extract_unparsable_graph_exits_1() {
    let temp = TempDir::new().unwrap();
    let graph = graph_file(&temp, "{ not json");

    enginesmith()
        .args(["extract", "objects"])
        .arg(&graph)
        .args(["--prefix", "Lib_iOS_arm64", "--mode", "release"])
        .assert()
        .code(1);
}

#[test]
fn test_plan_json() {
    let output = enginesmith()
        .args(["plan", "--platform", "android", "--mode", "debug", "--arch", "arm64"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["output_dir"], "android_debug_unopt_arm64");
    assert_eq!(plan["native_target"], "android_debug_arm64");
    assert_eq!(plan["plugin_destination"], "android/arm64");
}

#[test]
fn test_log_json_env_accepts_numeric_switch() {
    for value in ["1", "0", "yes", "off"] {
        enginesmith()
            .env("ENGINESMITH_LOG_JSON", value)
            .args(["plan", "-p", "mac", "-m", "release"])
            .assert()
            .success()
            .stdout(predicate::str::contains("host_release"));
    }
}

#[test]
fn test_log_json_flag_keeps_stdout_clean() {
    let output = enginesmith()
        .args(["--log-json", "--log-level", "debug", "plan", "-p", "ios", "-m", "release"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["output_dir"], "ios_release");
}

#[test]
fn test_plan_rejects_bitcode_off_ios() {
    enginesmith()
        .args(["plan", "-p", "mac", "-m", "release", "--bitcode"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bitcode"));
}

#[test]
fn test_build_without_engine_root_fails_before_running_tools() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("enginesmith.toml"), "[relink]\nlibrary_name = \"libX\"\n").unwrap();

    enginesmith()
        .current_dir(temp.path())
        .env("HOME", temp.path())
        .env_remove("ENGINESMITH_ENGINE_ROOT")
        .args(["build", "-p", "mac", "-m", "release"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("engine.root"));
}

#[test]
fn test_completions() {
    enginesmith()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("enginesmith"));
}

#[test]
fn test_help_lists_commands() {
    enginesmith()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("patch"));
}
