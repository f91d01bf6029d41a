//! Recursive directory walking
//!
//! One scheduler unit handles one directory: it queues the files that pass
//! the cheap tier and submits one child unit per subdirectory to the same
//! tree scheduler. Depth is therefore unbounded while width is bounded by the
//! scheduler's parallelism, and the walk is finished exactly when the tree
//! scheduler has nothing queued or running.

use crate::config::CrawlConfig;
use crate::events::EventSender;
use crate::fs::Filesystem;
use crate::parallel::{BoundedScheduler, CancelToken};
use crate::queue::QueueStore;
use crate::rules::{CheapVerdict, RuleSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct TreeWalker {
    config: Arc<CrawlConfig>,
    rules: Arc<RuleSet>,
    store: QueueStore,
    fs: Arc<dyn Filesystem>,
    scheduler: BoundedScheduler,
    events: EventSender,
    cancel: CancelToken,
}

impl TreeWalker {
    pub fn new(
        config: Arc<CrawlConfig>,
        rules: Arc<RuleSet>,
        store: QueueStore,
        fs: Arc<dyn Filesystem>,
        scheduler: BoundedScheduler,
        events: EventSender,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            rules,
            store,
            fs,
            scheduler,
            events,
            cancel,
        }
    }

    /// Submit a walk unit for `dir` to the tree scheduler
    pub fn submit(&self, dir: PathBuf) {
        let walker = self.clone();
        self.scheduler.submit(move || walker.walk_tree(&dir));
    }

    /// Walk one directory: queue passing files, submit subdirectories
    pub fn walk_tree(&self, dir: &Path) {
        if self.cancel.is_cancelled() {
            return;
        }

        let listing = match self.fs.list_dir(dir) {
            Ok(listing) => listing,
            Err(e) => {
                self.events
                    .trace(format!("Couldn't list {}: {e}", dir.display()));
                return;
            }
        };

        for (path, e) in &listing.errors {
            self.events
                .trace(format!("Couldn't inspect {}: {e}", path.display()));
        }

        let max_size = self.config.classify.max_size_to_enumerate;
        for file in &listing.files {
            // Queue keys are text; a lossy conversion would not name the same file again
            if file.path.to_str().is_none() {
                self.events.trace(format!(
                    "Skipping {}: path is not valid UTF-8",
                    file.path.display()
                ));
                continue;
            }
            if file.size > max_size {
                self.events.trace(format!(
                    "Skipping {}: {} bytes exceeds max_size_to_enumerate ({max_size})",
                    file.path.display(),
                    file.size
                ));
                continue;
            }

            match self.rules.cheap_verdict(&file.path) {
                CheapVerdict::Keep(rule) => {
                    match self.store.upsert_file(&file.path, file.size) {
                        Ok(true) => tracing::debug!(
                            "Queued {} (rule '{}')",
                            file.path.display(),
                            rule.name
                        ),
                        Ok(false) => {}
                        Err(e) => self.events.error(format!("{e:#}")),
                    }
                }
                CheapVerdict::Discard(rule) => {
                    tracing::trace!("{} discarded by rule '{}'", file.path.display(), rule.name);
                }
                CheapVerdict::NoMatch => {}
            }
        }

        for child in listing.dirs {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Some(rule) = self.rules.discarded_directory(&child) {
                tracing::debug!("Pruned {} (rule '{}')", child.display(), rule.name);
                continue;
            }
            self.submit(child);
        }
    }
}
