//! Cheap-tier and directory rule evaluation

use super::{ClassifierRule, MatchAction, MatchLocation, RuleSet, Tier};
use std::path::Path;
use std::sync::Arc;

/// Outcome of the cheap tier for one file during the walk
#[derive(Debug, Clone)]
pub enum CheapVerdict {
    /// A discard rule matched; the file is never queued
    Discard(Arc<ClassifierRule>),
    /// A snaffle or relay rule matched; the file is queued for scanning
    Keep(Arc<ClassifierRule>),
    NoMatch,
}

impl CheapVerdict {
    pub fn is_keep(&self) -> bool {
        matches!(self, CheapVerdict::Keep(_))
    }
}

/// Final component of a path, splitting on both `/` and `\`
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Extension of a path including its leading dot, or "" when there is none
pub fn extension_of(path: &str) -> &str {
    let name = file_name_of(path);
    match name.rfind('.') {
        Some(index) if index + 1 < name.len() => &name[index..],
        _ => "",
    }
}

impl ClassifierRule {
    /// Match a cheap-tier rule against a file path
    pub fn matches_file_path(&self, path: &str) -> bool {
        match self.location {
            MatchLocation::FileName => self.is_match(file_name_of(path)),
            MatchLocation::FilePath => self.is_match(path),
            MatchLocation::FileExtension => {
                let extension = extension_of(path);
                !extension.is_empty() && self.is_match(extension)
            }
            _ => false,
        }
    }
}

impl RuleSet {
    /// Evaluate every cheap-tier rule; any discard wins over any keep
    pub fn cheap_verdict(&self, path: &Path) -> CheapVerdict {
        let path_text = path.to_string_lossy();
        let mut keep = None;

        for rule in self.in_tier(Tier::Cheap) {
            if !rule.matches_file_path(&path_text) {
                continue;
            }
            match rule.action {
                MatchAction::Discard => return CheapVerdict::Discard(Arc::clone(rule)),
                MatchAction::Snaffle | MatchAction::Relay => {
                    keep.get_or_insert_with(|| Arc::clone(rule));
                }
            }
        }

        keep.map_or(CheapVerdict::NoMatch, CheapVerdict::Keep)
    }

    /// The first directory discard rule matching `dir`, if any
    pub fn discarded_directory(&self, dir: &Path) -> Option<&Arc<ClassifierRule>> {
        let dir_text = dir.to_string_lossy();
        self.in_tier(Tier::Directory)
            .filter(|rule| rule.action == MatchAction::Discard)
            .find(|rule| rule.is_match(&dir_text))
    }
}
