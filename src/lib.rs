//! # sharecrawl - resumable network share crawler
//!
//! Finds the shares exposed by a set of hosts, walks their directory trees
//! and reports files whose name, size or content match an ordered rule set.
//!
//! ## Pipeline
//!
//! - **Discover**: list each host's shares and keep the interesting ones
//! - **Enumerate**: walk every queued share and queue files passing the cheap rules
//! - **Scan**: read queued files and evaluate the content rules
//!
//! Each phase persists its output in a SQLite queue, so a run can stop after
//! any phase and a later run picks up where it left off.
//!
//! ## Quick Start
//!
//! ```bash
//! # Crawl a mounted share with the built-in rules
//! sharecrawl -i /mnt/fileserver/data
//!
//! # Enumerate now, scan later
//! sharecrawl --mode enumerate-only -i /mnt/fileserver/data
//! sharecrawl --mode scan-only --format json
//! ```

pub mod cli;
pub mod config;
pub mod discovery;
pub mod events;
pub mod fs;
pub mod orchestrator;
pub mod parallel;
pub mod queue;
pub mod rules;
pub mod scan;
pub mod walk;

pub use cli::{Cli, Output};
pub use config::CrawlConfig;
pub use orchestrator::{Mode, Orchestrator};

/// Result type alias for sharecrawl operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
