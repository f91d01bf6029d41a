//! Line-oriented text matching and match context extraction

use super::ClassifierRule;
use grep_searcher::sinks::Lossy;
use grep_searcher::SearcherBuilder;

/// The first line that matched a text rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub line_number: u64,
    /// Matched line without its line terminator
    pub line: String,
    /// Character index of the match start within `line`
    pub start: usize,
}

impl ClassifierRule {
    /// Find the first line of `content` on which any pattern matches
    ///
    /// Searching stops at the first matching line. On that line the first
    /// pattern in declared order decides where the match starts.
    pub fn first_line_match(&self, content: &[u8]) -> Option<LineMatch> {
        let matcher = self.line_matcher()?;
        let mut searcher = SearcherBuilder::new().line_number(true).build();

        let mut found = None;
        let outcome = searcher.search_slice(
            matcher,
            content,
            Lossy(|line_number, line| {
                found = Some((line_number, line.to_string()));
                Ok(false)
            }),
        );
        if let Err(e) = outcome {
            tracing::debug!("Line search for rule '{}' failed: {e}", self.name);
            return None;
        }

        let (line_number, raw_line) = found?;
        let line = raw_line.trim_end_matches(['\n', '\r']).to_string();
        let start = self
            .first_match(&line)
            .map(|m| line[..m.start()].chars().count())
            .unwrap_or(0);

        Some(LineMatch {
            line_number,
            line,
            start,
        })
    }
}

/// Cut the context window around a match
///
/// With a half-width of 0, or a line no longer than twice the half-width, the
/// whole trimmed line is returned. Otherwise the window starts `half_width`
/// characters before the match and spans at most `2 * half_width` characters.
/// Indices count characters, not bytes.
pub fn extract_context(line: &str, match_start: usize, half_width: usize) -> String {
    let chars: Vec<char> = line.chars().collect();
    let window_len = half_width.saturating_mul(2);

    if half_width == 0 || chars.len() <= window_len {
        return escape_line_breaks(line.trim());
    }

    let start = match_start.saturating_sub(half_width).min(chars.len());
    let len = (chars.len() - start).min(window_len);
    let window: String = chars[start..start + len].iter().collect();

    escape_line_breaks(window.trim())
}

/// Replace line breaks with the two characters `\n`
pub fn escape_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\\n")
        .replace('\r', "\\n")
        .replace('\n', "\\n")
}
