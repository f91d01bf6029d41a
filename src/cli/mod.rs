//! Command-line interface for sharecrawl
//!
//! Flags override the resolved configuration, the orchestrator runs on a
//! worker thread and the main thread drains the result bus into [`Output`].

use crate::config::{CrawlConfig, OutputFormat};
use crate::events::bus;
use crate::orchestrator::{Mode, Orchestrator};
use crate::rules::{RuleSet, Triage};
use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::path::PathBuf;

mod output;

pub use output::Output;

#[derive(Parser, Debug)]
#[command(
    name = "sharecrawl",
    version = env!("CARGO_PKG_VERSION"),
    about = "Fast, resumable network share crawler that finds files likely to hold secrets",
    long_about = "sharecrawl discovers shares on target hosts, walks their directory trees, \
                  and classifies files by name, size and content against an ordered rule set. \
                  Progress is kept in a SQLite queue so any phase can be resumed."
)]
pub struct Cli {
    /// Use custom configuration file (TOML, JSON or YAML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Phases to run
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Hosts to crawl instead of querying the directory (comma-separated)
    #[arg(short = 's', long, value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Share or directory paths to crawl directly (comma-separated)
    #[arg(short = 'i', long, value_delimiter = ',')]
    pub paths: Vec<PathBuf>,

    /// Resume queue database
    #[arg(long, value_name = "PATH")]
    pub queue_db: Option<PathBuf>,

    /// Directory of TOML/YAML rule files replacing the built-in rules
    #[arg(long, value_name = "DIR")]
    pub rule_dir: Option<PathBuf>,

    /// Minimum triage level to queue and report
    #[arg(long, value_enum)]
    pub interest: Option<Triage>,

    /// Event output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress everything but findings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);

        let mut config = CrawlConfig::load_with_custom_config(self.config.as_deref())?;
        self.apply_overrides(&mut config);

        let rules = RuleSet::load(config.classify.rule_dir.as_deref())?;
        tracing::info!("Loaded {} rules", rules.len());

        let mut output = Output::new(config.output.format, self.verbose, self.quiet);
        let (events, receiver) = bus();
        let orchestrator = Orchestrator::new(config, rules, events)?;

        let worker = std::thread::Builder::new()
            .name("sharecrawl-orchestrator".to_string())
            .spawn(move || orchestrator.execute())
            .context("Failed to start the orchestrator thread")?;

        receiver.drain(|event| output.handle(&event));

        let summary = worker
            .join()
            .map_err(|_| anyhow!("Orchestrator thread panicked"))??;
        if output.saw_fatal() {
            bail!("Crawl aborted");
        }
        tracing::info!("{summary}");
        Ok(())
    }

    /// Apply command-line flags on top of the resolved configuration
    pub fn apply_overrides(&self, config: &mut CrawlConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if !self.hosts.is_empty() {
            config.targets.hosts = self.hosts.clone();
        }
        if !self.paths.is_empty() {
            config.targets.paths = self.paths.clone();
        }
        if let Some(queue_db) = &self.queue_db {
            config.queue.path = queue_db.clone();
        }
        if let Some(rule_dir) = &self.rule_dir {
            config.classify.rule_dir = Some(rule_dir.clone());
        }
        if let Some(interest) = self.interest {
            config.classify.interest_level = interest;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // Diagnostics go to stderr so stdout stays a clean event stream
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
