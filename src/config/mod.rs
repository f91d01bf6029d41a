//! Configuration for a crawl
//!
//! [`CrawlConfig`] is resolved once at startup (built-in defaults, then an
//! optional config file, then `SHARECRAWL_` environment variables, then CLI
//! flags) and passed by value into the orchestrator, which shares it
//! read-only with every component.

pub mod core;


use crate::orchestrator::Mode;
use crate::rules::Triage;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a crawl
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Which phases to run
    pub mode: Mode,

    /// Hosts and paths to crawl
    pub targets: TargetsConfig,

    /// Resume queue location
    pub queue: QueueConfig,

    /// Scheduler limits and polling intervals
    pub concurrency: ConcurrencyConfig,

    /// Rule evaluation settings
    pub classify: ClassifyConfig,

    /// Event sink settings
    pub output: OutputConfig,

    /// Static host and share inventory used when no external directory is wired in
    pub inventory: InventoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    /// Explicit hosts; when set, the directory service is never queried
    pub hosts: Vec<String>,

    /// Explicit share or directory paths; when set without hosts, discovery is skipped
    pub paths: Vec<PathBuf>,

    /// Filter handed to the directory service
    pub host_filter: String,

    /// Hosts never contacted (case-insensitive)
    pub exclusions: Vec<String>,

    /// Delay between successive host submissions
    pub share_throttle_ms: u64,

    /// Share enumeration timeout per host
    pub timeout_secs: u64,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            paths: Vec::new(),
            host_filter: ".*".to_string(),
            exclusions: Vec::new(),
            share_throttle_ms: 0,
            timeout_secs: 5,
        }
    }
}

impl TargetsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn share_throttle(&self) -> Duration {
        Duration::from_millis(self.share_throttle_ms)
    }

    pub fn is_excluded(&self, host: &str) -> bool {
        self.exclusions
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(host))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub path: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sharecrawl_queue.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Parallel host enumerations (0 = number of CPUs)
    pub share_threads: usize,

    /// Parallel directory walks (0 = number of CPUs)
    pub tree_threads: usize,

    /// Parallel file scans (0 = number of CPUs)
    pub file_threads: usize,

    /// Queue depth at which submitters block (0 = unbounded)
    pub max_share_queue: usize,

    /// Must stay 0: walk units submit their own children
    pub max_tree_queue: usize,

    pub max_file_queue: usize,

    pub poll_interval_ms: u64,

    pub stats_interval_secs: u64,

    pub admission_poll_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            share_threads: 20,
            tree_threads: 20,
            file_threads: 20,
            max_share_queue: 0,
            max_tree_queue: 0,
            max_file_queue: 200_000,
            poll_interval_ms: 1000,
            stats_interval_secs: 10,
            admission_poll_ms: 500,
        }
    }
}

impl ConcurrencyConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn admission_poll(&self) -> Duration {
        Duration::from_millis(self.admission_poll_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Minimum triage for shares to be queued and findings to be reported
    pub interest_level: Triage,

    /// Files above this size are never queued
    pub max_size_to_enumerate: u64,

    /// Files above this size skip every expensive-tier rule
    pub max_size_to_grep: u64,

    /// Half-width of the context window around a text match
    pub match_context_bytes: usize,

    /// Extensions (with leading dot) eligible for text rules
    pub plain_text_extensions: Vec<String>,

    /// Total content read attempts for transient errors
    pub read_attempts: u32,

    /// Backoff before the first retry; doubles each retry
    pub retry_base_delay_ms: u64,

    /// Directory of rule files; embedded default rules are used when unset
    pub rule_dir: Option<PathBuf>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            interest_level: Triage::Green,
            max_size_to_enumerate: 5_000_000,
            max_size_to_grep: 1_000_000,
            match_context_bytes: 200,
            plain_text_extensions: [
                ".txt", ".log", ".config", ".xml", ".json", ".yml", ".yaml", ".ps1", ".bat",
                ".csv", ".ini",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            read_attempts: 3,
            retry_base_delay_ms: 1000,
            rule_dir: None,
        }
    }
}

impl ClassifyConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn is_plain_text(&self, extension: &str) -> bool {
        !extension.is_empty()
            && self
                .plain_text_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub hosts: Vec<InventoryHost>,

    /// Port probed with a TCP connect before listing a host's shares
    pub probe_port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryHost {
    pub name: String,
    pub shares: Vec<InventoryShare>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryShare {
    pub name: String,
    /// Filesystem path backing the share; printer and IPC shares have none
    pub path: Option<String>,
    pub description: Option<String>,
}

impl CrawlConfig {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.classify.read_attempts == 0 {
            bail!("classify.read_attempts must be at least 1");
        }
        if self.concurrency.max_tree_queue != 0 {
            bail!(
                "concurrency.max_tree_queue must be 0: walk units submit their own children \
                 and would block on themselves"
            );
        }
        regex::RegexBuilder::new(&self.targets.host_filter)
            .case_insensitive(true)
            .build()
            .with_context(|| {
                format!("Invalid targets.host_filter '{}'", self.targets.host_filter)
            })?;
        if let Some(host) = self.inventory.hosts.iter().find(|h| h.name.trim().is_empty()) {
            bail!(
                "inventory.hosts contains a host without a name ({} shares)",
                host.shares.len()
            );
        }
        Ok(())
    }
}
