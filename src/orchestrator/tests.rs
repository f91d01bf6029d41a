use super::*;
use crate::discovery::ShareInfo;
use crate::events::{Event, bus};
use crate::fs::testing::MemoryFilesystem;
use tempfile::TempDir;

const RULES: &str = r#"
[[rules]]
name = "RelayText"
location = "file_extension"
list_type = "exact"
patterns = [".txt"]
action = "relay"

[[rules]]
name = "Passwords"
location = "file_content_as_string"
patterns = ['password\s*=']
triage = "red"
"#;

struct OneHost;

impl ShareEnumerator for OneHost {
    fn list_shares(&self, host: &str, _timeout: Duration) -> Result<Vec<ShareInfo>> {
        Ok(vec![ShareInfo {
            name: format!("{host}-data"),
            path: Some("/data".to_string()),
            description: None,
        }])
    }
}

fn fast_config(queue: &TempDir, mode: Mode) -> CrawlConfig {
    let mut config = CrawlConfig::default();
    config.mode = mode;
    config.queue.path = queue.path().join("queue.db");
    config.concurrency.share_threads = 2;
    config.concurrency.tree_threads = 2;
    config.concurrency.file_threads = 2;
    config.concurrency.poll_interval_ms = 2;
    config.concurrency.admission_poll_ms = 1;
    config.concurrency.stats_interval_secs = 0;
    config.classify.retry_base_delay_ms = 1;
    config
}

fn filesystem() -> Arc<MemoryFilesystem> {
    Arc::new(
        MemoryFilesystem::new()
            .with_file("/share/passwords.txt", "db_password = hunter2\n")
            .with_file("/share/readme.txt", "nothing to see here\n")
            .with_file("/share/nested/more.txt", "password=abc\n"),
    )
}

fn run(config: CrawlConfig, fs: Arc<MemoryFilesystem>) -> (Result<RunSummary>, Vec<Event>) {
    let (events, receiver) = bus();
    let orchestrator = Orchestrator::new(config, RuleSet::from_toml_str(RULES).unwrap(), events)
        .unwrap()
        .with_filesystem(fs);
    let result = orchestrator.execute();
    drop(orchestrator);
    (result, receiver.collect())
}

fn file_results(events: &[Event]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = events
        .iter()
        .filter_map(|event| match event {
            Event::FileResult(result) => Some(result.path.clone()),
            _ => None,
        })
        .collect();
    paths.sort();
    paths
}

fn assert_single_trailing_finish(events: &[Event]) {
    assert_eq!(events.iter().filter(|event| event.is_finish()).count(), 1);
    assert!(events.last().is_some_and(Event::is_finish));
}

#[test]
fn test_mode_parsing_and_phases() {
    let mode: Mode = serde_json::from_str("\"enumerate-only\"").unwrap();
    assert_eq!(mode, Mode::EnumerateOnly);
    let mode: Mode = serde_json::from_str("\"scan_only\"").unwrap();
    assert_eq!(mode, Mode::ScanOnly);

    assert!(Mode::Full.discovers() && Mode::Full.enumerates() && Mode::Full.scans());
    assert!(!Mode::DiscoverOnly.enumerates());
    assert!(!Mode::ScanOnly.discovers());
    assert_eq!(Mode::DiscoverOnly.to_string(), "discover-only");
}

#[test]
fn test_unopenable_queue_is_fatal() {
    let queue = TempDir::new().unwrap();
    let mut config = fast_config(&queue, Mode::Full);
    config.queue.path = queue.path().join("missing").join("queue.db");

    let (result, events) = run(config, filesystem());

    assert!(result.is_err());
    let fatal = events
        .iter()
        .filter(|event| matches!(event, Event::Fatal(_)))
        .count();
    assert_eq!(fatal, 1);
    assert_single_trailing_finish(&events);
}

#[test]
fn test_full_run_over_path_target() {
    let queue = TempDir::new().unwrap();
    let mut config = fast_config(&queue, Mode::Full);
    config.targets.paths = vec!["/share".into()];

    let (result, events) = run(config, filesystem());
    let summary = result.unwrap();

    assert_eq!(
        file_results(&events),
        vec![
            PathBuf::from("/share/nested/more.txt"),
            PathBuf::from("/share/passwords.txt"),
        ]
    );
    assert!(!events.iter().any(|event| matches!(event, Event::Error(_))));
    assert_eq!(summary.files_scanned, 3);
    assert_eq!(summary.files_pending, 0);
    assert_single_trailing_finish(&events);
}

#[test]
fn test_phases_resume_from_the_queue() {
    let queue = TempDir::new().unwrap();
    let mut config = fast_config(&queue, Mode::EnumerateOnly);
    config.targets.paths = vec!["/share".into()];

    let (result, events) = run(config.clone(), filesystem());
    assert_eq!(result.unwrap().files_pending, 3);
    assert!(file_results(&events).is_empty());

    // Simulate a crash after one file was scanned
    let store = QueueStore::open(&config.queue.path).unwrap();
    let passwords = store
        .list_files()
        .unwrap()
        .into_iter()
        .find(|record| record.path.ends_with("passwords.txt"))
        .unwrap();
    assert!(store.delete_file(passwords.id).unwrap());
    drop(store);

    config.mode = Mode::ScanOnly;
    let (result, events) = run(config, filesystem());
    let summary = result.unwrap();

    assert_eq!(file_results(&events), vec![PathBuf::from("/share/nested/more.txt")]);
    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.files_pending, 0);
    assert_single_trailing_finish(&events);
}

#[test]
fn test_discover_only_queues_shares_without_walking() {
    let queue = TempDir::new().unwrap();
    let mut config = fast_config(&queue, Mode::DiscoverOnly);
    config.targets.hosts = vec!["fs01".into(), "fs02".into()];

    let (events, receiver) = bus();
    let fs = filesystem();
    let orchestrator = Orchestrator::new(config, RuleSet::from_toml_str(RULES).unwrap(), events)
        .unwrap()
        .with_filesystem(fs.clone())
        .with_share_enumerator(Arc::new(OneHost));
    let summary = orchestrator.execute().unwrap();
    drop(orchestrator);
    let events = receiver.collect();

    assert_eq!(summary.shares_queued, 2);
    assert_eq!(summary.files_pending, 0);
    assert_eq!(fs.reads(), 0);
    let share_results = events
        .iter()
        .filter(|event| matches!(event, Event::ShareResult(_)))
        .count();
    assert_eq!(share_results, 2);
    assert_single_trailing_finish(&events);
}

#[test]
fn test_cancelled_scan_keeps_records() {
    let queue = TempDir::new().unwrap();
    let mut config = fast_config(&queue, Mode::EnumerateOnly);
    config.targets.paths = vec!["/share".into()];
    let (result, _) = run(config.clone(), filesystem());
    assert_eq!(result.unwrap().files_pending, 3);

    config.mode = Mode::ScanOnly;
    let (events, receiver) = bus();
    let fs = filesystem();
    let orchestrator = Orchestrator::new(config, RuleSet::from_toml_str(RULES).unwrap(), events)
        .unwrap()
        .with_filesystem(fs.clone());
    orchestrator.cancel_token().cancel();
    let summary = orchestrator.execute().unwrap();
    drop(orchestrator);

    assert_eq!(summary.files_pending, 3);
    assert_eq!(fs.reads(), 0);
    assert_single_trailing_finish(&receiver.collect());
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let mut config = CrawlConfig::default();
    config.concurrency.max_tree_queue = 10;
    let (events, _receiver) = bus();
    assert!(Orchestrator::new(config, RuleSet::default(), events).is_err());
}
