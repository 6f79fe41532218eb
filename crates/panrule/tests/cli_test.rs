//! Integration tests for the `panrule` CLI binary.
//!
//! Offline commands run against an isolated environment; the appliance
//! round trips use a wiremock server standing in for the XML API.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `panrule` binary with env isolation.
///
/// Clears all `PANRULE_*` env vars and points the config file at `config`
/// so tests never touch the user's real configuration.
fn panrule_cmd_with(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("panrule");
    cmd.env("HOME", "/tmp/panrule-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/panrule-cli-test-nonexistent")
        .env("PANRULE_CONFIG", config)
        .env("NO_COLOR", "1")
        .env_remove("PANRULE_PROFILE")
        .env_remove("PANRULE_HOST")
        .env_remove("PANRULE_API_KEY")
        .env_remove("PANRULE_OUTPUT")
        .env_remove("PANRULE_INSECURE")
        .env_remove("PANRULE_TIMEOUT")
        .env_remove("PANRULE_TOPOLOGY")
        .env_remove("PANRULE_USERNAME")
        .env_remove("PANRULE_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn panrule_cmd() -> assert_cmd::Command {
    panrule_cmd_with(Path::new("/tmp/panrule-cli-test-nonexistent/config.toml"))
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn xml(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(body)
}

const EMPTY: &str = r#"<response status="success"><result total-count="0" count="0"/></response>"#;

const TWO_RULES: &str = r#"<response status="success"><result total-count="1" count="1">
  <rules>
    <entry name="allow-dns" uuid="5a4b0c36-1a9c-4c53-8f0b-6e1b2c3d4e5f">
      <application><member>dns</member></application>
      <action>allow</action>
    </entry>
    <entry name="deny-all"><action>deny</action></entry>
  </rules>
</result></response>"#;

const ONE_RULE: &str = r#"<response status="success"><result total-count="1" count="1">
  <rules>
    <entry name="allow-dns" uuid="5a4b0c36-1a9c-4c53-8f0b-6e1b2c3d4e5f">
      <application><member>dns</member></application>
      <action>allow</action>
    </entry>
  </rules>
</result></response>"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = panrule_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    panrule_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("decryption rules")
            .and(predicate::str::contains("group"))
            .and(predicate::str::contains("policy"))
            .and(predicate::str::contains("rules")),
    );
}

#[test]
fn test_version_flag() {
    panrule_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("panrule"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    panrule_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    panrule_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = panrule_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success(), "Expected failure for invalid subcommand");
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_rules_list_without_appliance() {
    panrule_cmd()
        .args(["rules", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No appliance configured"));
}

#[test]
fn test_unknown_profile() {
    panrule_cmd()
        .args(["--profile", "lab", "rules", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile 'lab' not found"));
}

#[test]
fn test_invalid_position() {
    panrule_cmd()
        .args(["identity", "encode", "--position", "sideways", "a"])
        .assert()
        .code(2);
}

// ── Identity ────────────────────────────────────────────────────────

#[test]
fn test_identity_decode_legacy_firewall_layout() {
    panrule_cmd()
        .args(["-o", "plain", "identity", "decode", "vsys2:0::eA=="])
        .assert()
        .success()
        .stdout(predicate::str::diff("shared:rulebase:vsys2:0::eA==\n"));
}

#[test]
fn test_identity_decode_panorama_json() {
    let output = panrule_cmd()
        .args([
            "-o",
            "json",
            "--topology",
            "controller",
            "identity",
            "decode",
            "edge:post-rulebase:3:deny-all:YQpi",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["device_group"], "edge");
    assert_eq!(value["rulebase"], "post-rulebase");
    assert_eq!(value["names"], serde_json::json!(["a", "b"]));
    assert_eq!(value["placement"]["reference"], "deny-all");
}

#[test]
fn test_identity_encode() {
    panrule_cmd()
        .args(["-o", "plain", "identity", "encode", "--position", "top", "a", "b"])
        .assert()
        .success()
        .stdout(predicate::str::diff("shared:rulebase:vsys1:5::YQpi\n"));
}

#[test]
fn test_identity_encode_requires_reference() {
    panrule_cmd()
        .args(["identity", "encode", "--position", "before", "a"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("position_reference"));
}

#[test]
fn test_identity_decode_garbage() {
    panrule_cmd()
        .args(["identity", "decode", "a:b"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid identity"));
}

// ── Schema ──────────────────────────────────────────────────────────

#[test]
fn test_schema_json() {
    let output = panrule_cmd()
        .args(["-o", "json", "schema", "--family", "nat", "--resource", "group"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["version"].is_u64());
    let names: Vec<&str> = value["attributes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["name"].as_str())
        .collect();
    assert!(names.contains(&"position_keyword"));
    assert!(names.contains(&"rule"));
}

#[test]
fn test_schema_plain_lists_nested_paths() {
    panrule_cmd()
        .args(["-o", "plain", "schema"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rule.name"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_env() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("panrule.toml");
    panrule_cmd_with(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("panrule.toml"));
}

#[test]
fn test_config_show_masks_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(
        dir.path(),
        "config.toml",
        r#"
default_profile = "lab"

[profiles.lab]
host = "fw.lab.example"
api_key = "LUFRPT1-super-secret"
"#,
    );
    panrule_cmd_with(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("fw.lab.example")
                .and(predicate::str::contains("********"))
                .and(predicate::str::contains("super-secret").not()),
        );
}

#[test]
fn test_config_profiles_marks_active() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(
        dir.path(),
        "config.toml",
        r#"
default_profile = "edge"

[profiles.edge]
host = "panorama.example"
topology = "controller"

[profiles.lab]
host = "fw.lab.example"
"#,
    );
    let output = panrule_cmd_with(&config)
        .args(["-o", "json", "config", "profiles"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let profiles = value.as_array().unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0]["name"], "edge");
    assert_eq!(profiles[0]["active"], true);
    assert_eq!(profiles[0]["topology"], "controller");
    assert_eq!(profiles[1]["active"], false);
}

// ── State migration (offline) ───────────────────────────────────────

#[test]
fn test_migrate_requires_topology() {
    let dir = tempfile::tempdir().unwrap();
    let state = write_file(
        dir.path(),
        "group.json",
        r#"{"resource":"rule-group","family":"security","id":"vsys2:0::eA==","attributes":{}}"#,
    );
    panrule_cmd()
        .args(["group", "migrate", "--state"])
        .arg(&state)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--topology"));
}

#[test]
fn test_migrate_rewrites_legacy_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = write_file(
        dir.path(),
        "group.json",
        r#"{"resource":"rule-group","family":"security","id":"vsys2:0::eA==","attributes":{"rule":[{"name":"x"}]}}"#,
    );
    panrule_cmd()
        .args(["--topology", "standalone", "group", "migrate", "--state"])
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("migrated"));

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(written["id"], "shared:rulebase:vsys2:0::eA==");
    assert_eq!(written["attributes"]["vsys"], "vsys2");
}

#[test]
fn test_migrate_refuses_policy_state_for_group() {
    let dir = tempfile::tempdir().unwrap();
    let state = write_file(
        dir.path(),
        "policy.json",
        r#"{"schema_version":2,"resource":"policy","family":"nat","id":"shared:rulebase:vsys1","attributes":{}}"#,
    );
    panrule_cmd()
        .args(["--topology", "standalone", "group", "migrate", "--state"])
        .arg(&state)
        .assert()
        .code(6)
        .stderr(predicate::str::contains("holds a policy"));
}

// ── Appliance round trips ───────────────────────────────────────────

#[test]
fn test_rules_list_against_mock_appliance() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/api/"))
            .and(body_string_contains("action=get"))
            .and(header("X-PAN-KEY", "test-key"))
            .respond_with(xml(TWO_RULES))
            .expect(1)
            .mount(&server),
    );

    panrule_cmd()
        .args(["--host", server.uri().as_str(), "--api-key", "test-key", "--topology", "standalone"])
        .args(["-o", "plain", "rules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::diff("allow-dns\ndeny-all\n"));
}

#[test]
fn test_group_apply_creates_state() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    // First read sees an empty rulebase, the refresh after the write sees
    // the new rule.
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/api/"))
            .and(body_string_contains("action=get"))
            .respond_with(xml(EMPTY))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server),
    );
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/api/"))
            .and(body_string_contains("action=get"))
            .respond_with(xml(ONE_RULE))
            .mount(&server),
    );
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/api/"))
            .and(body_string_contains("action=multi-config"))
            .and(body_string_contains("allow-dns"))
            .respond_with(xml(r#"<response status="success" code="20"><msg>command succeeded</msg></response>"#))
            .expect(1)
            .mount(&server),
    );

    let dir = tempfile::tempdir().unwrap();
    let declaration = write_file(
        dir.path(),
        "group.yaml",
        "position_keyword: top\nrule:\n  - name: allow-dns\n    applications: [dns]\n",
    );
    let state = dir.path().join("state").join("group.json");

    panrule_cmd()
        .args(["--host", server.uri().as_str(), "--api-key", "test-key", "--topology", "standalone"])
        .args(["-o", "plain", "group", "apply", "--state"])
        .arg(&state)
        .arg("--file")
        .arg(&declaration)
        .assert()
        .success()
        .stdout(predicate::str::diff("shared:rulebase:vsys1:5::YWxsb3ctZG5z\n"))
        .stderr(predicate::str::contains("created: allow-dns"));

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(written["resource"], "rule-group");
    assert_eq!(written["family"], "security");
    assert_eq!(written["attributes"]["position_keyword"], "top");
    assert_eq!(written["attributes"]["rule"][0]["name"], "allow-dns");
}

#[test]
fn test_group_read_without_state() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    let dir = tempfile::tempdir().unwrap();

    panrule_cmd()
        .args(["--host", server.uri().as_str(), "--api-key", "test-key", "--topology", "standalone"])
        .args(["group", "read", "--state"])
        .arg(dir.path().join("absent.json"))
        .assert()
        .code(4)
        .stderr(predicate::str::contains("No state"));
}

#[test]
fn test_group_delete_needs_yes_when_not_interactive() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    let dir = tempfile::tempdir().unwrap();
    let state = write_file(
        dir.path(),
        "group.json",
        r#"{"schema_version":2,"resource":"rule-group","family":"security","id":"shared:rulebase:vsys1:0::YQ==","attributes":{"rule":[{"name":"a"}]}}"#,
    );

    panrule_cmd()
        .args(["--host", server.uri().as_str(), "--api-key", "test-key", "--topology", "standalone"])
        .args(["group", "delete", "--state"])
        .arg(&state)
        .write_stdin("")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
    assert!(state.exists());
}
