//! Mode-driven sequencing of the crawl phases
//!
//! The orchestrator owns the three schedulers and hands clones of their
//! handles to the share finder, the tree walker and the scan units.
//!
//! ```text
//!  DiscoverOnly ── discover ─────────────────────────────┐
//!  EnumerateOnly ─────────── enumerate ──────────────────┤
//!  ScanOnly ──────────────────────────── scan ───────────┤
//!  Full ────────── discover ─▶ enumerate ─▶ scan ────────┤
//!                                                        ▼
//!                                   wait loop (stats) ─▶ Finish
//! ```
//!
//! Every phase reads its input from the queue store, so each mode can be
//! resumed on its own against the same database. The only fatal condition
//! is failing to open that database.

#[cfg(test)]
mod tests;

use crate::config::{ConcurrencyConfig, CrawlConfig};
use crate::discovery::{
    DirectoryService, InventoryDirectory, InventoryShareEnumerator, ShareEnumerator, ShareFinder,
};
use crate::events::EventSender;
use crate::fs::{Filesystem, LocalFilesystem};
use crate::parallel::{BoundedScheduler, CancelToken, SchedulerStats, resolve_threads};
use crate::queue::QueueStore;
use crate::rules::{RuleSet, Triage};
use crate::scan::ContentScanner;
use crate::walk::TreeWalker;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which phases a run executes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Discover, enumerate and scan in one process
    #[default]
    Full,
    /// Only find shares and queue them
    #[serde(alias = "discover_only")]
    DiscoverOnly,
    /// Only walk queued shares and queue files
    #[serde(alias = "enumerate_only")]
    EnumerateOnly,
    /// Only scan queued files
    #[serde(alias = "scan_only")]
    ScanOnly,
}

impl Mode {
    pub fn discovers(self) -> bool {
        matches!(self, Mode::Full | Mode::DiscoverOnly)
    }

    pub fn enumerates(self) -> bool {
        matches!(self, Mode::Full | Mode::EnumerateOnly)
    }

    pub fn scans(self) -> bool {
        matches!(self, Mode::Full | Mode::ScanOnly)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Full => "full",
            Mode::DiscoverOnly => "discover-only",
            Mode::EnumerateOnly => "enumerate-only",
            Mode::ScanOnly => "scan-only",
        })
    }
}

/// The three phase schedulers of a run
#[derive(Clone)]
pub struct Schedulers {
    pub share: BoundedScheduler,
    pub tree: BoundedScheduler,
    pub file: BoundedScheduler,
}

impl Schedulers {
    pub fn from_config(concurrency: &ConcurrencyConfig) -> Result<Self> {
        let poll = concurrency.admission_poll();
        Ok(Self {
            share: BoundedScheduler::new(
                "ShareFinder",
                resolve_threads(concurrency.share_threads),
                concurrency.max_share_queue,
                poll,
            )?,
            tree: BoundedScheduler::new(
                "TreeWalker",
                resolve_threads(concurrency.tree_threads),
                concurrency.max_tree_queue,
                poll,
            )?,
            file: BoundedScheduler::new(
                "FileScanner",
                resolve_threads(concurrency.file_threads),
                concurrency.max_file_queue,
                poll,
            )?,
        })
    }

    pub fn is_outstanding(&self) -> bool {
        self.share.is_outstanding() || self.tree.is_outstanding() || self.file.is_outstanding()
    }

    pub fn stats(&self) -> [SchedulerStats; 3] {
        [self.share.stats(), self.tree.stats(), self.file.stats()]
    }
}

/// Totals reported at the end of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: Mode,
    pub shares_queued: u64,
    pub files_pending: u64,
    pub files_scanned: u64,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Finished {} run in {:.1}s: {} shares queued, {} files scanned, \
             {} file records pending",
            self.mode,
            self.elapsed.as_secs_f64(),
            self.shares_queued,
            self.files_scanned,
            self.files_pending
        )
    }
}

struct Progress {
    started: Instant,
    last_stats: Instant,
}

pub struct Orchestrator {
    config: Arc<CrawlConfig>,
    rules: Arc<RuleSet>,
    events: EventSender,
    fs: Arc<dyn Filesystem>,
    directory: Arc<dyn DirectoryService>,
    enumerator: Arc<dyn ShareEnumerator>,
    schedulers: Schedulers,
    cancel: CancelToken,
}

impl Orchestrator {
    /// Build an orchestrator with the local filesystem and the configured inventory
    pub fn new(config: CrawlConfig, rules: RuleSet, events: EventSender) -> Result<Self> {
        config.validate()?;
        let schedulers = Schedulers::from_config(&config.concurrency)?;
        let directory = Arc::new(InventoryDirectory::new(&config.inventory));
        let enumerator = Arc::new(InventoryShareEnumerator::new(config.inventory.clone()));

        Ok(Self {
            config: Arc::new(config),
            rules: Arc::new(rules),
            events,
            fs: Arc::new(LocalFilesystem),
            directory,
            enumerator,
            schedulers,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn DirectoryService>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_share_enumerator(mut self, enumerator: Arc<dyn ShareEnumerator>) -> Self {
        self.enumerator = enumerator;
        self
    }

    /// Token that aborts the run: no new work is submitted and in-flight units return early
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn schedulers(&self) -> &Schedulers {
        &self.schedulers
    }

    /// Run the configured mode to completion
    ///
    /// Emits exactly one `Finish` event, always last. Fails only when the
    /// queue store cannot be opened, after emitting one `Fatal` event.
    pub fn execute(&self) -> Result<RunSummary> {
        let mode = self.config.mode;
        let started = Instant::now();
        self.events.info(format!(
            "Starting {mode} run with {} rules",
            self.rules.len()
        ));

        let store = match QueueStore::open(&self.config.queue.path) {
            Ok(store) => store,
            Err(e) => {
                self.events.fatal(format!("{e:#}"));
                self.events.finish();
                return Err(e);
            }
        };
        tracing::debug!("Queue store opened at {}", store.location());

        let mut progress = Progress {
            started,
            last_stats: started,
        };

        if mode.discovers() {
            self.discover(&store, &mut progress);
        }
        if mode.enumerates() {
            self.enumerate(&store, &mut progress);
        }
        if mode.scans() {
            self.scan(&store);
        }

        self.wait_while(|| self.schedulers.is_outstanding(), &store, &mut progress);
        self.emit_stats(&store, progress.started);

        let summary = RunSummary {
            mode,
            shares_queued: self.count_or_report(store.share_count()),
            files_pending: self.count_or_report(store.file_count()),
            files_scanned: self.schedulers.file.completed(),
            elapsed: started.elapsed(),
        };
        self.events.info(summary.to_string());
        self.events.finish();
        Ok(summary)
    }

    fn discover(&self, store: &QueueStore, progress: &mut Progress) {
        let finder = ShareFinder::new(
            Arc::clone(&self.config),
            Arc::clone(&self.rules),
            store.clone(),
            self.schedulers.share.clone(),
            Arc::clone(&self.directory),
            Arc::clone(&self.enumerator),
            self.events.clone(),
            self.cancel.clone(),
        );
        finder.find_shares();

        let share = &self.schedulers.share;
        self.wait_while(|| share.is_outstanding(), store, progress);
        self.events.info(format!(
            "Share discovery finished: {} shares queued",
            self.count_or_report(store.share_count())
        ));
    }

    fn enumerate(&self, store: &QueueStore, progress: &mut Progress) {
        for path in &self.config.targets.paths {
            let path_text = path.to_string_lossy();
            if let Err(e) = store.upsert_share(&path_text, None, Triage::Green) {
                self.events.error(format!("{e:#}"));
            }
        }

        let shares = match store.list_shares() {
            Ok(shares) => shares,
            Err(e) => {
                self.events.error(format!("Couldn't load queued shares: {e:#}"));
                return;
            }
        };
        self.events
            .info(format!("Enumerating {} shares", shares.len()));

        let walker = TreeWalker::new(
            Arc::clone(&self.config),
            Arc::clone(&self.rules),
            store.clone(),
            Arc::clone(&self.fs),
            self.schedulers.tree.clone(),
            self.events.clone(),
            self.cancel.clone(),
        );
        for share in shares {
            if self.cancel.is_cancelled() {
                break;
            }
            walker.submit(PathBuf::from(share.path));
        }

        let tree = &self.schedulers.tree;
        self.wait_while(|| tree.is_outstanding(), store, progress);
        self.events.info(format!(
            "Enumeration finished: {} files queued",
            self.count_or_report(store.file_count())
        ));
    }

    fn scan(&self, store: &QueueStore) {
        let files = match store.list_files() {
            Ok(files) => files,
            Err(e) => {
                self.events.error(format!("Couldn't load queued files: {e:#}"));
                return;
            }
        };
        self.events.info(format!("Scanning {} files", files.len()));

        let scanner = ContentScanner::new(
            Arc::clone(&self.config),
            Arc::clone(&self.rules),
            Arc::clone(&self.fs),
            self.events.clone(),
        );
        for record in files {
            if self.cancel.is_cancelled() {
                break;
            }

            let scanner = scanner.clone();
            let store = store.clone();
            let events = self.events.clone();
            let cancel = self.cancel.clone();
            self.schedulers.file.submit(move || {
                // A cancelled unit leaves its record for the next resume
                if cancel.is_cancelled() {
                    return;
                }
                scanner.scan_file(&record.path, record.size);
                if let Err(e) = store.delete_file(record.id) {
                    events.error(format!("{e:#}"));
                }
            });
        }
    }

    fn wait_while<F>(&self, outstanding: F, store: &QueueStore, progress: &mut Progress)
    where
        F: Fn() -> bool,
    {
        let poll = self.config.concurrency.poll_interval();
        let stats_interval = self.config.concurrency.stats_interval();

        while outstanding() {
            std::thread::sleep(poll);
            if !stats_interval.is_zero() && progress.last_stats.elapsed() >= stats_interval {
                self.emit_stats(store, progress.started);
                progress.last_stats = Instant::now();
            }
        }
    }

    fn emit_stats(&self, store: &QueueStore, started: Instant) {
        for stats in self.schedulers.stats() {
            self.events.info(stats.to_string());
        }

        let scanned = self.schedulers.file.completed();
        let elapsed = started.elapsed().as_secs_f64().max(0.001);
        self.events.info(format!(
            "{scanned} files scanned in {elapsed:.1}s ({:.1} files/s), {} file records pending",
            scanned as f64 / elapsed,
            self.count_or_report(store.file_count())
        ));
    }

    fn count_or_report(&self, count: Result<u64>) -> u64 {
        count.unwrap_or_else(|e| {
            self.events.error(format!("{e:#}"));
            0
        })
    }
}
