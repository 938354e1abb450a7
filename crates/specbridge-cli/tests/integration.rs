#![allow(deprecated)]
use assert_cmd::Command;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn specbridge(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("specbridge").unwrap();
    cmd.current_dir(dir.path())
        .env("SPECBRIDGE_ROOT", dir.path())
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn write_config(dir: &TempDir, api_url: &str, token: Option<&str>) {
    let token_line = token
        .map(|t| format!("      token: {t}\n"))
        .unwrap_or_default();
    write(
        dir.path(),
        ".specbridge.yaml",
        &format!(
            "version: \"1.0\"\n\
             source:\n  type: kiro\n  path: .kiro/specs\n\
             targets:\n  - name: github-issues\n    type: github\n    enabled: true\n    config:\n      owner: acme\n      repo: widgets\n{token_line}      apiUrl: {api_url}\n"
        ),
    );
}

fn write_spec(dir: &TempDir) {
    write(
        dir.path(),
        ".kiro/specs/auth/tasks.md",
        "# Implementation Plan\n\n- [ ] 1. Set up project\n",
    );
}

// ---------------------------------------------------------------------------
// specbridge init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_default_config() {
    let dir = TempDir::new().unwrap();
    specbridge(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .specbridge.yaml"))
        .stdout(predicate::str::contains(".specbridge/"));

    let content = std::fs::read_to_string(dir.path().join(".specbridge.yaml")).unwrap();
    assert!(content.contains("version: \"1.0\""));
    assert!(content.contains("${GITHUB_TOKEN}"));
}

#[test]
fn init_keeps_existing_config_without_force() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".specbridge.yaml", "custom: true\n");

    specbridge(&dir)
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
    let content = std::fs::read_to_string(dir.path().join(".specbridge.yaml")).unwrap();
    assert_eq!(content, "custom: true\n");

    specbridge(&dir).args(["init", "--force"]).assert().success();
    let content = std::fs::read_to_string(dir.path().join(".specbridge.yaml")).unwrap();
    assert!(content.contains("targets:"));
}

#[test]
fn init_skips_gitignore_hint_when_ignored() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".gitignore", "target/\n.specbridge/\n");
    specbridge(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains(".gitignore").not());
}

// ---------------------------------------------------------------------------
// specbridge status
// ---------------------------------------------------------------------------

#[test]
fn status_on_fresh_project() {
    let dir = TempDir::new().unwrap();
    specbridge(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No items have been synced yet"));
}

#[test]
fn status_lists_items_and_targets() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "http://127.0.0.1:9", Some("t"));
    write(
        dir.path(),
        ".specbridge/sync-state.json",
        r#"{"auth:1": "12", "auth:req-1": "3"}"#,
    );

    specbridge(&dir)
        .args(["status", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total synced items: 2"))
        .stdout(predicate::str::contains("#12"))
        .stdout(predicate::str::contains("acme/widgets"));
}

#[test]
fn status_json_is_parseable() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".specbridge/sync-state.json", r#"{"auth:1": "12"}"#);

    let out = specbridge(&dir)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["synced_count"], 1);
    assert_eq!(value["items"]["auth:1"], "12");
}

// ---------------------------------------------------------------------------
// specbridge sync
// ---------------------------------------------------------------------------

#[test]
fn sync_without_config_fails_with_hint() {
    let dir = TempDir::new().unwrap();
    specbridge(&dir)
        .arg("sync")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("configuration file not found"))
        .stderr(predicate::str::contains("specbridge init"));
}

#[test]
fn sync_single_scope_requires_id() {
    let dir = TempDir::new().unwrap();
    specbridge(&dir)
        .args(["sync", "--scope", "single"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--id"));
}

#[test]
fn sync_with_undefined_env_var_fails() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "http://127.0.0.1:9", Some("${GITHUB_TOKEN}"));
    write_spec(&dir);
    specbridge(&dir)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITHUB_TOKEN"));
}

#[test]
fn dry_run_touches_no_target() {
    let dir = TempDir::new().unwrap();
    // No token and an unreachable API: any real call would fail.
    write_config(&dir, "http://127.0.0.1:9", None);
    write_spec(&dir);

    specbridge(&dir)
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("github-issues"))
        .stdout(predicate::str::contains("0 failed"));

    assert!(!dir.path().join(".specbridge/sync-state.json").exists());
}

#[test]
fn sync_creates_issue_and_records_remote_id() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    write_config(&dir, &server.url(), Some("test-token"));
    write_spec(&dir);

    let access = server
        .mock("GET", "/repos/acme/widgets")
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_body(r#"{"full_name":"acme/widgets"}"#)
        .create();
    let lookup = server
        .mock("GET", "/repos/acme/widgets/issues")
        .match_query(Matcher::UrlEncoded(
            "labels".into(),
            "specbridge:task-id:auth:1".into(),
        ))
        .with_status(200)
        .with_body("[]")
        .create();
    let create = server
        .mock("POST", "/repos/acme/widgets/issues")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "title": "Set up project",
            "labels": ["specbridge:task-id:auth:1"],
        })))
        .with_status(201)
        .with_body(r#"{"number": 42}"#)
        .create();

    specbridge(&dir)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: 1"));

    access.assert();
    lookup.assert();
    create.assert();

    let state = std::fs::read_to_string(dir.path().join(".specbridge/sync-state.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(state["auth:1"], "42");

    specbridge(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total synced items: 1"))
        .stdout(predicate::str::contains("Last run"));
}

#[test]
fn sync_updates_existing_issue_with_comment() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    write_config(&dir, &server.url(), Some("test-token"));
    write_spec(&dir);

    server
        .mock("GET", "/repos/acme/widgets")
        .with_status(200)
        .with_body("{}")
        .create();
    server
        .mock("GET", "/repos/acme/widgets/issues")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"[{"number": 7, "title": "Old title", "body": "", "state": "open",
                 "labels": [{"name": "specbridge:task-id:auth:1"}], "assignee": null}]"#,
        )
        .create();
    let update = server
        .mock("PATCH", "/repos/acme/widgets/issues/7")
        .match_body(Matcher::PartialJson(serde_json::json!({"title": "Set up project"})))
        .with_status(200)
        .with_body(r#"{"number": 7}"#)
        .create();
    let comment = server
        .mock("POST", "/repos/acme/widgets/issues/7/comments")
        .match_body(Matcher::Regex("Old title".into()))
        .with_status(201)
        .with_body("{}")
        .create();

    specbridge(&dir)
        .args(["sync", "--scope", "tasks", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("updated: 1"))
        .stdout(predicate::str::contains("updated task auth:1 (#7)"));

    update.assert();
    comment.assert();
}

#[test]
fn rejected_credentials_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    write_config(&dir, &server.url(), Some("bad-token"));
    write_spec(&dir);

    server
        .mock("GET", "/repos/acme/widgets")
        .with_status(401)
        .with_body(r#"{"message":"Bad credentials"}"#)
        .create();

    specbridge(&dir)
        .arg("sync")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("failed:  1"))
        .stderr(predicate::str::contains("authentication failed"));

    let last_run =
        std::fs::read_to_string(dir.path().join(".specbridge/last-run.json")).unwrap();
    let last_run: serde_json::Value = serde_json::from_str(&last_run).unwrap();
    assert_eq!(last_run["targets"][0]["failed"], 1);
}
