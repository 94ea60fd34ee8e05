//! Integration tests for the `chtl-mod` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn chtl_mod(workspace: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chtl-mod"))
        .arg("--workspace")
        .arg(workspace)
        .args(args)
        .env("NO_COLOR", "1")
        .env("CHTL_LOG", "warn")
        .output()
        .expect("failed to run chtl-mod")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    write(
        &temp.path().join("module/Button.cmod"),
        "[Export] {\n    @Style Primary : .btn { color: blue; }\n}\n",
    );
    write(
        &temp.path().join("pages/shared.chtl"),
        "[Origin] @Style box { color: red; }\n",
    );
    temp
}

#[test]
fn test_resolve_found() {
    let ws = workspace();
    let output = chtl_mod(ws.path(), &["resolve", "chtl", "Button"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Resolved Button"));
    assert!(text.contains("Primary"));
}

#[test]
fn test_resolve_not_found_exit_code() {
    let ws = workspace();
    let output = chtl_mod(ws.path(), &["resolve", "chtl", "Missing"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Not found"));
}

#[test]
fn test_resolve_json() {
    let ws = workspace();
    let output = chtl_mod(ws.path(), &["resolve", "chtl", "Button", "--json"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["found"], true);
    assert_eq!(value["selected"]["moduleName"], "Button");
    assert_eq!(value["selected"]["moduleType"], "cmod");
}

#[test]
fn test_resolve_origin() {
    let ws = workspace();
    let from = ws.path().join("pages");
    let output = chtl_mod(
        ws.path(),
        &[
            "resolve",
            "origin",
            "shared.chtl",
            "--tag",
            "@Style",
            "--block",
            "box",
            "--from",
            from.to_str().unwrap(),
            "--json",
        ],
    );
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["selected"]["payload"], "color: red;");
}

#[test]
fn test_resolve_origin_missing_block_fails() {
    let ws = workspace();
    let from = ws.path().join("pages");
    let output = chtl_mod(
        ws.path(),
        &[
            "resolve",
            "origin",
            "shared.chtl",
            "--tag",
            "@Style",
            "--block",
            "missing",
            "--from",
            from.to_str().unwrap(),
        ],
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing"));
}

#[test]
fn test_index_build_writes_documents() {
    let ws = workspace();
    let out_dir = ws.path().join("out");
    let module_dir = ws.path().join("module");
    let output = chtl_mod(
        ws.path(),
        &[
            "index",
            "build",
            module_dir.to_str().unwrap(),
            "--official",
            "--out",
            out_dir.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("Indexed 1 modules"));
    assert!(out_dir.join("module-index.json").is_file());
    assert!(out_dir.join("module-index.compact.json").is_file());
}

#[test]
fn test_project_index_and_status() {
    let ws = workspace();
    let output = chtl_mod(ws.path(), &["index", "build"]);
    assert!(output.status.success());
    assert!(ws.path().join(".chtl/module-index.json").is_file());

    let status = stdout(&chtl_mod(ws.path(), &["index", "status"]));
    assert!(status.contains("Project index"));
    assert!(status.contains("not found"));
}

#[test]
fn test_lookup_and_exports() {
    let ws = workspace();
    let lookup = chtl_mod(ws.path(), &["lookup", "Button", "--json"]);
    assert!(lookup.status.success());
    let value: serde_json::Value = serde_json::from_slice(&lookup.stdout).unwrap();
    assert_eq!(value["filePath"], ws.path().join("module/Button.cmod").display().to_string());

    let exports = chtl_mod(ws.path(), &["exports", "Primary"]);
    assert!(exports.status.success());
    assert!(stdout(&exports).contains("Button"));

    let none = chtl_mod(ws.path(), &["exports", "Nothing"]);
    assert_eq!(none.status.code(), Some(1));
}

#[test]
fn test_paths_and_list() {
    let ws = workspace();
    let paths = stdout(&chtl_mod(ws.path(), &["paths"]));
    assert!(paths.contains("[workspace]"));

    let list = stdout(&chtl_mod(ws.path(), &["list", "--all"]));
    assert!(list.contains("Button"));
    assert!(list.contains("1 modules"));
}

#[test]
fn test_list_export_names() {
    let ws = workspace();
    write(
        &ws.path().join("module/Card.cmod"),
        "[Export] {\n    @Element Card : div\n}\n",
    );

    let styles = stdout(&chtl_mod(ws.path(), &["list", "--exports", "style"]));
    assert!(styles.contains("Primary"));
    assert!(!styles.contains("Card"));
    assert!(styles.contains("1 style exports"));

    let elements = stdout(&chtl_mod(ws.path(), &["list", "--exports", "element"]));
    assert!(elements.contains("Card"));

    let output = chtl_mod(ws.path(), &["list", "--all", "--exports", "style"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_config_file_search_paths() {
    let ws = TempDir::new().unwrap();
    write(&ws.path().join("vendor/Extra.cmod"), "");
    write(
        &ws.path().join("chtl.toml"),
        "[modules]\nsearch-paths = [\"${workspaceFolder}/vendor\"]\n",
    );

    let output = chtl_mod(ws.path(), &["resolve", "chtl", "Extra"]);
    assert!(output.status.success());
}

#[test]
fn test_invalid_config_is_an_error() {
    let ws = TempDir::new().unwrap();
    write(&ws.path().join("chtl.toml"), "[modules]\ncache-ttl-secs = 0\n");

    let output = chtl_mod(ws.path(), &["paths"]);
    assert_eq!(output.status.code(), Some(2));
}
