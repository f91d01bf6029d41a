//! Declarative classifier rules
//!
//! A [`RuleSet`] is loaded once before any phase starts and then shared
//! read-only across every unit of work. Rules are evaluated in four places,
//! chosen by their [`MatchLocation`]:
//!
//! - **Share rules** decide whether a discovered share is kept and at what triage
//! - **Directory rules** prune subtrees during the walk
//! - **Cheap tier** (name, path, extension) gates which files enter the queue
//! - **Expensive tier** (length, MD5, bytes, text) runs only in the scan phase
//!
//! All pattern matching is case-insensitive.

pub mod content;
pub mod file;
pub mod loader;
pub mod share;
pub mod text;


pub use content::{ContentHit, ContentView};
pub use file::{CheapVerdict, extension_of, file_name_of};
pub use share::ShareVerdict;

use anyhow::{Context, Result, bail};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What part of a share, directory or file a rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLocation {
    ShareName,
    DirectoryPath,
    FileName,
    FilePath,
    FileExtension,
    FileLength,
    FileMd5,
    FileContentAsBytes,
    FileContentAsString,
}

/// Evaluation stage a location belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Share,
    Directory,
    Cheap,
    Expensive,
}

impl MatchLocation {
    pub fn tier(self) -> Tier {
        match self {
            MatchLocation::ShareName => Tier::Share,
            MatchLocation::DirectoryPath => Tier::Directory,
            MatchLocation::FileName | MatchLocation::FilePath | MatchLocation::FileExtension => {
                Tier::Cheap
            }
            MatchLocation::FileLength
            | MatchLocation::FileMd5
            | MatchLocation::FileContentAsBytes
            | MatchLocation::FileContentAsString => Tier::Expensive,
        }
    }

    /// Whether evaluating this location needs the file's bytes
    pub fn reads_content(self) -> bool {
        matches!(
            self,
            MatchLocation::FileMd5
                | MatchLocation::FileContentAsBytes
                | MatchLocation::FileContentAsString
        )
    }
}

/// How a rule's patterns are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchListType {
    #[default]
    Regex,
    Exact,
    Contains,
    StartsWith,
    EndsWith,
}

impl MatchListType {
    /// Regular expression source equivalent to one pattern of this type
    pub fn to_regex_source(self, pattern: &str) -> String {
        match self {
            MatchListType::Regex => pattern.to_string(),
            MatchListType::Exact => format!("^{}$", regex::escape(pattern)),
            MatchListType::Contains => regex::escape(pattern),
            MatchListType::StartsWith => format!("^{}", regex::escape(pattern)),
            MatchListType::EndsWith => format!("{}$", regex::escape(pattern)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAction {
    /// Report a finding
    #[default]
    Snaffle,
    /// Prune the share, directory or file
    Discard,
    /// Admit a file to the queue without reporting it
    Relay,
}

/// Ordered interest score of a finding
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Triage {
    #[default]
    Green,
    Yellow,
    Red,
    Black,
}

impl Triage {
    pub fn score(self) -> i64 {
        match self {
            Triage::Green => 0,
            Triage::Yellow => 1,
            Triage::Red => 2,
            Triage::Black => 3,
        }
    }

    pub fn from_score(score: i64) -> Option<Self> {
        match score {
            0 => Some(Triage::Green),
            1 => Some(Triage::Yellow),
            2 => Some(Triage::Red),
            3 => Some(Triage::Black),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Triage::Green => "green",
            Triage::Yellow => "yellow",
            Triage::Red => "red",
            Triage::Black => "black",
        }
    }
}

impl fmt::Display for Triage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule as written in a rule file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    pub location: MatchLocation,
    #[serde(default)]
    pub list_type: MatchListType,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub action: MatchAction,
    #[serde(default)]
    pub triage: Triage,
    #[serde(default)]
    pub description: Option<String>,
    /// Exact byte length for `file_length` rules
    #[serde(default)]
    pub match_length: Option<u64>,
}

/// A compiled, immutable classifier rule
#[derive(Debug)]
pub struct ClassifierRule {
    pub name: String,
    pub location: MatchLocation,
    pub list_type: MatchListType,
    pub patterns: Vec<String>,
    pub action: MatchAction,
    pub triage: Triage,
    pub description: Option<String>,
    pub match_length: Option<u64>,
    regexes: Vec<Regex>,
    bytes_regexes: Vec<regex::bytes::Regex>,
    line_matcher: Option<grep_regex::RegexMatcher>,
}

impl ClassifierRule {
    /// Compile a rule definition, rejecting invalid or empty pattern lists
    pub fn new(definition: RuleDefinition) -> Result<Self> {
        let RuleDefinition {
            name,
            location,
            list_type,
            patterns,
            action,
            triage,
            description,
            match_length,
        } = definition;

        if name.trim().is_empty() {
            bail!("Rule name must not be empty");
        }
        if patterns.is_empty() && location != MatchLocation::FileLength {
            bail!("Rule '{name}' has no patterns");
        }

        let sources: Vec<String> = patterns
            .iter()
            .map(|pattern| list_type.to_regex_source(pattern))
            .collect();

        let mut regexes = Vec::with_capacity(sources.len());
        let mut bytes_regexes = Vec::new();
        let mut line_matcher = None;

        for source in &sources {
            regexes.push(
                RegexBuilder::new(source)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Invalid pattern '{source}' in rule '{name}'"))?,
            );
        }

        match location {
            MatchLocation::FileContentAsBytes => {
                for source in &sources {
                    bytes_regexes.push(
                        regex::bytes::RegexBuilder::new(source)
                            .case_insensitive(true)
                            .build()
                            .with_context(|| {
                                format!("Invalid pattern '{source}' in rule '{name}'")
                            })?,
                    );
                }
            }
            MatchLocation::FileContentAsString => {
                line_matcher = Some(
                    grep_regex::RegexMatcherBuilder::new()
                        .case_insensitive(true)
                        .crlf(true)
                        .line_terminator(Some(b'\n'))
                        .build_many(&sources)
                        .with_context(|| format!("Invalid line pattern in rule '{name}'"))?,
                );
            }
            _ => {}
        }

        Ok(Self {
            name,
            location,
            list_type,
            patterns,
            action,
            triage,
            description,
            match_length,
            regexes,
            bytes_regexes,
            line_matcher,
        })
    }

    /// True if any pattern matches `input`
    pub fn is_match(&self, input: &str) -> bool {
        self.regexes.iter().any(|regex| regex.is_match(input))
    }

    /// First match of the first pattern (in declared order) that matches `input`
    pub fn first_match<'h>(&self, input: &'h str) -> Option<regex::Match<'h>> {
        self.regexes.iter().find_map(|regex| regex.find(input))
    }

    pub(crate) fn bytes_regexes(&self) -> &[regex::bytes::Regex] {
        &self.bytes_regexes
    }

    pub(crate) fn line_matcher(&self) -> Option<&grep_regex::RegexMatcher> {
        self.line_matcher.as_ref()
    }

    pub fn tier(&self) -> Tier {
        self.location.tier()
    }
}

/// Ordered, immutable collection of compiled rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Arc<ClassifierRule>>,
}

impl RuleSet {
    pub fn new(rules: Vec<ClassifierRule>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.name.to_lowercase()) {
                bail!("Duplicate rule name '{}'", rule.name);
            }
        }

        Ok(Self {
            rules: rules.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn from_definitions(definitions: Vec<RuleDefinition>) -> Result<Self> {
        let rules = definitions
            .into_iter()
            .map(ClassifierRule::new)
            .collect::<Result<Vec<_>>>()?;
        Self::new(rules)
    }

    pub fn rules(&self) -> &[Arc<ClassifierRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ClassifierRule>> {
        self.rules
            .iter()
            .find(|rule| rule.name.eq_ignore_ascii_case(name))
    }

    pub fn in_tier(&self, tier: Tier) -> impl Iterator<Item = &Arc<ClassifierRule>> {
        self.rules.iter().filter(move |rule| rule.tier() == tier)
    }

    /// Cheap and expensive rules in declared order
    pub fn file_rules(&self) -> impl Iterator<Item = &Arc<ClassifierRule>> {
        self.rules
            .iter()
            .filter(|rule| matches!(rule.tier(), Tier::Cheap | Tier::Expensive))
    }
}
