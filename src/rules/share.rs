//! Share rule evaluation

use super::{ClassifierRule, MatchAction, RuleSet, Tier, Triage};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum ShareVerdict {
    Discard(Arc<ClassifierRule>),
    Keep {
        triage: Triage,
        /// Highest-triage snaffle rule that matched
        rule: Option<Arc<ClassifierRule>>,
    },
}

impl RuleSet {
    /// Any matching discard drops the share; otherwise the highest matching triage wins
    pub fn classify_share(&self, unc_path: &str) -> ShareVerdict {
        let mut best: Option<&Arc<ClassifierRule>> = None;

        for rule in self.in_tier(Tier::Share) {
            if !rule.is_match(unc_path) {
                continue;
            }
            match rule.action {
                MatchAction::Discard => return ShareVerdict::Discard(Arc::clone(rule)),
                MatchAction::Snaffle => {
                    if best.is_none_or(|current| rule.triage > current.triage) {
                        best = Some(rule);
                    }
                }
                MatchAction::Relay => {}
            }
        }

        ShareVerdict::Keep {
            triage: best.map_or(Triage::Green, |rule| rule.triage),
            rule: best.cloned(),
        }
    }
}
