//! CLI integration tests for cms-news-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! the offline `plan` command, and exit codes for configuration errors.
//! Nothing here needs a database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the cms-news-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("cms-news-migrate").unwrap()
}

/// A minimal valid configuration file.
fn config_file(extra: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "source:\n  host: localhost\n  database: legacy\n  user: cms\ndestination:\n  output_dir: bundle\n{}",
        extra
    )
    .unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--select"))
        .stdout(predicate::str::contains("--page-size"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cms-news-migrate"));
}

#[test]
fn test_global_flags_documented() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--state-file"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "plan"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(1);
}

#[test]
fn test_unknown_category_exits_with_code_1() {
    let file = config_file("");

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "plan",
            "--select",
            "entries,polls",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown data category 'polls'"));
}

#[test]
fn test_resume_without_state_file_exits_with_code_1() {
    let file = config_file("");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "resume"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--state-file is required"));
}

// =============================================================================
// Plan Tests
// =============================================================================

#[test]
fn test_plan_lists_queue_in_dependency_order() {
    let file = config_file("");

    let output = cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();

    let position = |name: &str| stdout.find(name).unwrap();
    assert!(position("[categories]") < position("[acl]"));
    assert!(position("[acl]") < position("[entries]"));
    assert!(position("[entries]") < position("[comments]"));
    assert!(position("[comments]") < position("[comment-responses]"));
    assert!(position("[entries]") < position("[attachments]"));
}

#[test]
fn test_plan_select_adds_comment_responses() {
    let file = config_file("");

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "plan",
            "--select",
            "comments",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[comments]"))
        .stdout(predicate::str::contains("[comment-responses]"))
        .stdout(predicate::str::contains("[entries]").not());
}

#[test]
fn test_plan_output_json() {
    let file = config_file("migration:\n  select: [entries, categories]\n  page_sizes:\n    entries: 25");

    let output = cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--output-json",
            "plan",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let planned: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let planned = planned.as_array().unwrap();
    assert_eq!(planned.len(), 2);
    assert_eq!(planned[0]["category"], "de.codequake.cms.category.news");
    assert_eq!(planned[0]["page_size"], 300);
    assert_eq!(planned[1]["alias"], "entries");
    assert_eq!(planned[1]["page_size"], 25);
}

#[test]
fn test_plan_article_profile_drops_unsupported_categories() {
    let file = config_file("");
    let mut yaml = std::fs::read_to_string(file.path()).unwrap();
    yaml = yaml.replace("user: cms", "user: cms\n  profile: fireball2-article");
    std::fs::write(file.path(), yaml).unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[entries] page size 300"))
        .stdout(predicate::str::contains("[likes]").not())
        .stdout(predicate::str::contains("[acl]").not());
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
