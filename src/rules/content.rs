//! Expensive-tier evaluation against file content

use super::text::extract_context;
use super::{ClassifierRule, MatchLocation};
use anyhow::{Result, bail};
use std::cell::OnceCell;

/// File bytes shared by every content rule evaluated for one file
pub struct ContentView<'a> {
    bytes: &'a [u8],
    md5: OnceCell<String>,
}

impl<'a> ContentView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            md5: OnceCell::new(),
        }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Lowercase hex MD5 digest, computed on first use
    pub fn md5(&self) -> &str {
        self.md5
            .get_or_init(|| format!("{:x}", md5::compute(self.bytes)))
    }
}

/// A content rule that matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHit {
    pub context: Option<String>,
}

impl ClassifierRule {
    /// Compare the file size with the rule's `match_length`
    ///
    /// A `file_length` rule without a length is malformed and yields an error.
    pub fn matches_length(&self, size: u64) -> Result<bool> {
        match self.match_length {
            Some(length) => Ok(length == size),
            None => bail!("Rule '{}' is a file_length rule without match_length", self.name),
        }
    }

    /// Evaluate a content-reading rule (MD5, bytes or text)
    pub fn match_content(
        &self,
        view: &ContentView<'_>,
        context_half_width: usize,
    ) -> Option<ContentHit> {
        match self.location {
            MatchLocation::FileMd5 => {
                let digest = view.md5();
                self.patterns
                    .iter()
                    .any(|pattern| pattern.trim().eq_ignore_ascii_case(digest))
                    .then_some(ContentHit { context: None })
            }
            MatchLocation::FileContentAsBytes => {
                let hit = self
                    .bytes_regexes()
                    .iter()
                    .find_map(|regex| regex.find(view.bytes()))?;
                let context = String::from_utf8_lossy(hit.as_bytes()).into_owned();
                Some(ContentHit {
                    context: Some(context),
                })
            }
            MatchLocation::FileContentAsString => {
                let found = self.first_line_match(view.bytes())?;
                Some(ContentHit {
                    context: Some(extract_context(
                        &found.line,
                        found.start,
                        context_half_width,
                    )),
                })
            }
            _ => None,
        }
    }
}
