//! Content scanning of queued files
//!
//! The scan phase evaluates every file rule against one queued file:
//!
//! - cheap `snaffle` rules report on name, path or extension alone
//! - expensive rules run only when the file is within `max_size_to_grep`
//! - text rules additionally need a plain-text extension
//!
//! File content is read at most once per file (with transient-error retry)
//! and shared by every content rule. Each match is reported only when the
//! acting principal can read, write or modify the file.

pub mod retry;

use crate::config::CrawlConfig;
use crate::events::{EventSender, FileResult};
use crate::fs::Filesystem;
use crate::rules::{
    ClassifierRule, ContentHit, ContentView, MatchAction, MatchLocation, RuleSet, Tier,
    extension_of,
};
use retry::{ReadOutcome, read_with_retry};
use std::cell::OnceCell;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct ContentScanner {
    config: Arc<CrawlConfig>,
    rules: Arc<RuleSet>,
    fs: Arc<dyn Filesystem>,
    events: EventSender,
}

impl ContentScanner {
    pub fn new(
        config: Arc<CrawlConfig>,
        rules: Arc<RuleSet>,
        fs: Arc<dyn Filesystem>,
        events: EventSender,
    ) -> Self {
        Self {
            config,
            rules,
            fs,
            events,
        }
    }

    /// Classify one file and emit a `FileResult` per matching rule
    ///
    /// Returns the number of results emitted. A matching `discard` rule stops
    /// evaluation of the remaining rules for this file.
    pub fn scan_file(&self, path: &Path, size: u64) -> usize {
        let classify = &self.config.classify;
        let path_text = path.to_string_lossy();
        let text_allowed = classify.is_plain_text(extension_of(&path_text));
        let grep_allowed = size <= classify.max_size_to_grep;

        let content: OnceCell<Option<Vec<u8>>> = OnceCell::new();
        let view: OnceCell<Option<ContentView<'_>>> = OnceCell::new();
        let mut size_reported = false;
        let mut emitted = 0;

        // Discard rules always apply; the interest level only gates reporting
        let interesting = self.rules.file_rules().filter(|rule| {
            rule.action == MatchAction::Discard || rule.triage >= classify.interest_level
        });

        for rule in interesting {
            let hit = match rule.tier() {
                Tier::Cheap => (rule.action != MatchAction::Relay
                    && rule.matches_file_path(&path_text))
                .then_some(ContentHit { context: None }),
                Tier::Expensive => {
                    if rule.action == MatchAction::Relay {
                        continue;
                    }
                    if !grep_allowed {
                        if !size_reported {
                            self.events.trace(format!(
                                "Skipping content rules for {}: {size} bytes exceeds \
                                 max_size_to_grep ({})",
                                path.display(),
                                classify.max_size_to_grep
                            ));
                            size_reported = true;
                        }
                        continue;
                    }

                    match rule.location {
                        MatchLocation::FileLength => match rule.matches_length(size) {
                            Ok(true) => Some(ContentHit { context: None }),
                            Ok(false) => None,
                            Err(e) => {
                                self.events
                                    .error(format!("{e:#}; skipped for {}", path.display()));
                                continue;
                            }
                        },
                        MatchLocation::FileContentAsString if !text_allowed => continue,
                        _ => {
                            let loaded = view.get_or_init(|| {
                                content
                                    .get_or_init(|| self.read_content(path))
                                    .as_deref()
                                    .map(ContentView::new)
                            });
                            match loaded {
                                Some(view) => {
                                    rule.match_content(view, classify.match_context_bytes)
                                }
                                None => continue,
                            }
                        }
                    }
                }
                Tier::Share | Tier::Directory => None,
            };

            let Some(hit) = hit else {
                continue;
            };

            if rule.action == MatchAction::Discard {
                tracing::debug!("{} discarded by rule '{}'", path.display(), rule.name);
                break;
            }

            if self.report(path, size, rule, hit) {
                emitted += 1;
            }
        }

        emitted
    }

    fn read_content(&self, path: &Path) -> Option<Vec<u8>> {
        let classify = &self.config.classify;
        match read_with_retry(
            self.fs.as_ref(),
            path,
            classify.read_attempts,
            classify.retry_base_delay(),
            classify.max_size_to_grep,
        ) {
            ReadOutcome::Content(content) if content.len() as u64 > classify.max_size_to_grep => {
                self.events.trace(format!(
                    "Skipping content rules for {}: grew past max_size_to_grep ({})",
                    path.display(),
                    classify.max_size_to_grep
                ));
                None
            }
            ReadOutcome::Content(content) => Some(content),
            ReadOutcome::TransientFailure {
                attempts,
                last_error,
            } => {
                self.events.trace(format!(
                    "Giving up on {} after {attempts} attempts: {last_error}",
                    path.display()
                ));
                None
            }
            ReadOutcome::PermissionDenied => None,
            ReadOutcome::Failed(e) => {
                self.events
                    .error(format!("Failed to read {}: {e}", path.display()));
                None
            }
        }
    }

    fn report(&self, path: &Path, size: u64, rule: &Arc<ClassifierRule>, hit: ContentHit) -> bool {
        let rw = self.fs.probe_access(path);
        if !rw.any() {
            tracing::debug!(
                "Suppressed '{}' match on {}: no read, write or modify access",
                rule.name,
                path.display()
            );
            return false;
        }

        self.events.file_result(FileResult {
            path: path.to_path_buf(),
            size,
            rule: Arc::clone(rule),
            triage: rule.triage,
            rw,
            context: hit.context,
        });
        true
    }
}
