//! Integration tests for the sharecrawl library and CLI

use assert_cmd::Command;
use predicates::prelude::*;
use sharecrawl::config::CrawlConfig;
use sharecrawl::events::{Event, bus};
use sharecrawl::orchestrator::{Mode, Orchestrator};
use sharecrawl::queue::QueueStore;
use sharecrawl::rules::{RuleSet, Triage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const RULES: &str = r#"
[[rules]]
name = "RelayText"
location = "file_extension"
list_type = "exact"
patterns = [".txt"]
action = "relay"

[[rules]]
name = "PasswordAssignment"
location = "file_content_as_string"
patterns = ['password\s*=']
triage = "red"
"#;

/// Share with one file holding a credential and one harmless file
fn create_share(root: &Path) {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join("passwords.txt"), "db_password = hunter2\n").unwrap();
    fs::write(root.join("readme.txt"), "Welcome to the team share.\n").unwrap();
}

fn fast_config(temp_dir: &TempDir, mode: Mode) -> CrawlConfig {
    let mut config = CrawlConfig::default();
    config.mode = mode;
    config.targets.paths = vec![temp_dir.path().join("share")];
    config.queue.path = temp_dir.path().join("queue.db");
    config.concurrency.share_threads = 2;
    config.concurrency.tree_threads = 2;
    config.concurrency.file_threads = 2;
    config.concurrency.poll_interval_ms = 5;
    config.concurrency.admission_poll_ms = 1;
    config.concurrency.stats_interval_secs = 0;
    config.classify.retry_base_delay_ms = 1;
    config
}

fn run(config: CrawlConfig) -> Vec<Event> {
    let (events, receiver) = bus();
    let orchestrator =
        Orchestrator::new(config, RuleSet::from_toml_str(RULES).unwrap(), events).unwrap();
    orchestrator.execute().unwrap();
    drop(orchestrator);
    receiver.collect()
}

fn mentions(event: &Event, needle: &str) -> bool {
    serde_json::to_string(event).unwrap().contains(needle)
}

/// Test a full crawl reports the credential file and nothing about the harmless one
#[test]
fn test_full_crawl_finds_password_file() {
    let temp_dir = TempDir::new().unwrap();
    create_share(&temp_dir.path().join("share"));

    let events = run(fast_config(&temp_dir, Mode::Full));

    let findings: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::FileResult(result) => Some(result),
            _ => None,
        })
        .collect();
    assert_eq!(findings.len(), 1);
    assert!(findings[0].path.ends_with("passwords.txt"));
    assert_eq!(findings[0].triage, Triage::Red);
    assert_eq!(findings[0].rule.name, "PasswordAssignment");
    assert!(findings[0].rw.can_read);
    assert!(
        findings[0]
            .context
            .as_deref()
            .is_some_and(|context| context.contains("password = hunter2"))
    );

    assert!(!events.iter().any(|event| mentions(event, "readme.txt")));
    assert!(!events.iter().any(|event| matches!(event, Event::Error(_) | Event::Fatal(_))));
    assert_eq!(events.iter().filter(|event| event.is_finish()).count(), 1);
    assert!(events.last().is_some_and(Event::is_finish));

    let store = QueueStore::open(&temp_dir.path().join("queue.db")).unwrap();
    assert_eq!(store.file_count().unwrap(), 0);
}

/// Test enumerate and scan can run as separate invocations against one queue
#[test]
fn test_enumerate_then_scan_resumes() {
    let temp_dir = TempDir::new().unwrap();
    create_share(&temp_dir.path().join("share"));

    let events = run(fast_config(&temp_dir, Mode::EnumerateOnly));
    assert!(!events.iter().any(|event| matches!(event, Event::FileResult(_))));

    let store = QueueStore::open(&temp_dir.path().join("queue.db")).unwrap();
    assert_eq!(store.share_count().unwrap(), 1);
    assert_eq!(store.file_count().unwrap(), 2);
    drop(store);

    // Enumerating again must not duplicate queued files
    run(fast_config(&temp_dir, Mode::EnumerateOnly));
    let store = QueueStore::open(&temp_dir.path().join("queue.db")).unwrap();
    assert_eq!(store.file_count().unwrap(), 2);
    drop(store);

    let events = run(fast_config(&temp_dir, Mode::ScanOnly));
    let findings = events
        .iter()
        .filter(|event| matches!(event, Event::FileResult(_)))
        .count();
    assert_eq!(findings, 1);

    let store = QueueStore::open(&temp_dir.path().join("queue.db")).unwrap();
    assert_eq!(store.file_count().unwrap(), 0);
}

/// Test CLI binary exists and responds to --help
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("sharecrawl").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--queue-db"))
        .stdout(predicate::str::contains("--mode"));
}

/// Test CLI responds to --version
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("sharecrawl").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sharecrawl"));
}

/// Test an invalid mode shows an error
#[test]
fn test_cli_invalid_mode() {
    let mut cmd = Command::cargo_bin("sharecrawl").unwrap();
    cmd.args(["--mode", "everything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test a JSON-mode crawl with a custom rule directory
#[test]
fn test_cli_json_crawl() {
    let temp_dir = TempDir::new().unwrap();
    let share = temp_dir.path().join("share");
    create_share(&share);
    let rule_dir = temp_dir.path().join("rules");
    fs::create_dir_all(&rule_dir).unwrap();
    fs::write(rule_dir.join("passwords.toml"), RULES).unwrap();

    let mut cmd = Command::cargo_bin("sharecrawl").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("SHARECRAWL_CONCURRENCY__POLL_INTERVAL_MS", "5")
        .env("SHARECRAWL_CONCURRENCY__ADMISSION_POLL_MS", "1")
        .arg("-i")
        .arg(&share)
        .arg("--queue-db")
        .arg(temp_dir.path().join("queue.db"))
        .arg("--rule-dir")
        .arg(&rule_dir)
        .args(["--format", "json", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"file_result""#))
        .stdout(predicate::str::contains("passwords.txt"))
        .stdout(predicate::str::contains("readme.txt").not());
}

/// Test an unopenable queue database aborts the crawl
#[test]
fn test_cli_fatal_queue_failure() {
    let temp_dir = TempDir::new().unwrap();
    let share = temp_dir.path().join("share");
    create_share(&share);

    let mut cmd = Command::cargo_bin("sharecrawl").unwrap();
    cmd.current_dir(temp_dir.path())
        .arg("-i")
        .arg(&share)
        .arg("--queue-db")
        .arg(temp_dir.path().join("missing").join("queue.db"))
        .arg("-q")
        .assert()
        .failure()
        .stderr(predicate::str::contains("[Fatal]"));
}
