//! Share discovery
//!
//! Resolves the hosts to crawl, then submits one unit per host to the share
//! scheduler. Each unit lists the host's shares, evaluates share rules and
//! queues the shares at or above the interest level.
//!
//! Host precedence:
//! 1. `targets.hosts` when set
//! 2. nothing when only `targets.paths` is set (the enumerate phase seeds those)
//! 3. the directory service queried with `targets.host_filter`

pub mod targets;

pub use targets::{
    DirectoryService, InventoryDirectory, InventoryShareEnumerator, ShareEnumerator, ShareInfo,
};

use crate::config::CrawlConfig;
use crate::events::{EventSender, ShareResult};
use crate::parallel::{BoundedScheduler, CancelToken};
use crate::queue::QueueStore;
use crate::rules::{RuleSet, ShareVerdict};
use std::sync::Arc;

/// UNC path of a share on a host
pub fn unc_path(host: &str, share: &str) -> String {
    format!(r"\\{host}\{share}")
}

#[derive(Clone)]
pub struct ShareFinder {
    config: Arc<CrawlConfig>,
    rules: Arc<RuleSet>,
    store: QueueStore,
    scheduler: BoundedScheduler,
    directory: Arc<dyn DirectoryService>,
    enumerator: Arc<dyn ShareEnumerator>,
    events: EventSender,
    cancel: CancelToken,
}

impl ShareFinder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<CrawlConfig>,
        rules: Arc<RuleSet>,
        store: QueueStore,
        scheduler: BoundedScheduler,
        directory: Arc<dyn DirectoryService>,
        enumerator: Arc<dyn ShareEnumerator>,
        events: EventSender,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            rules,
            store,
            scheduler,
            directory,
            enumerator,
            events,
            cancel,
        }
    }

    /// Submit one enumeration unit per target host; returns the number submitted
    pub fn find_shares(&self) -> usize {
        let targets = &self.config.targets;

        let hosts = if !targets.hosts.is_empty() {
            targets.hosts.clone()
        } else if !targets.paths.is_empty() {
            self.events
                .debug("Path targets given, skipping share discovery");
            return 0;
        } else {
            match self.directory.hosts(&targets.host_filter) {
                Ok(hosts) => hosts,
                Err(e) => {
                    self.events
                        .error(format!("Couldn't resolve hosts to crawl: {e:#}"));
                    return 0;
                }
            }
        };

        self.events
            .info(format!("Looking for shares on {} hosts", hosts.len()));

        let throttle = targets.share_throttle();
        let mut submitted = 0;
        for host in hosts {
            if self.cancel.is_cancelled() {
                break;
            }
            if targets.is_excluded(&host) {
                self.events.debug(format!("Skipping excluded host {host}"));
                continue;
            }
            if submitted > 0 && !throttle.is_zero() {
                std::thread::sleep(throttle);
            }

            let finder = self.clone();
            self.scheduler.submit(move || finder.enumerate_host(&host));
            submitted += 1;
        }

        submitted
    }

    /// List one host's shares and queue the interesting ones
    pub fn enumerate_host(&self, host: &str) {
        if self.cancel.is_cancelled() {
            return;
        }

        let shares = match self
            .enumerator
            .list_shares(host, self.config.targets.timeout())
        {
            Ok(shares) => shares,
            Err(e) => {
                self.events
                    .trace(format!("Couldn't get shares from {host}: {e:#}"));
                return;
            }
        };

        let interest = self.config.classify.interest_level;
        for share in shares {
            let has_path = share
                .path
                .as_deref()
                .is_some_and(|path| !path.trim().is_empty());
            if !has_path {
                self.events.trace(format!(
                    "Skipping share {} on {host}: no filesystem path",
                    share.name
                ));
                continue;
            }

            let unc = unc_path(host, &share.name);
            match self.rules.classify_share(&unc) {
                ShareVerdict::Discard(rule) => {
                    self.events
                        .trace(format!("{unc} discarded by rule '{}'", rule.name));
                }
                ShareVerdict::Keep { triage, rule } => {
                    self.events.share_result(ShareResult {
                        path: unc.clone(),
                        description: share.description.clone(),
                        triage,
                        rule: rule.map(|rule| rule.name.clone()),
                    });

                    if triage < interest {
                        continue;
                    }
                    if let Err(e) =
                        self.store
                            .upsert_share(&unc, share.description.as_deref(), triage)
                    {
                        self.events.error(format!("{e:#}"));
                    }
                }
            }
        }
    }
}
