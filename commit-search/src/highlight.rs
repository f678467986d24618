//! Presentation clean-up of matched diffs and commit messages.

use crate::error::Result;
use crate::operation::pattern_source;
use regex::Regex;
use regex::RegexBuilder;
use shardscan_protocol::Highlight;
use shardscan_protocol::HighlightedText;
use shardscan_protocol::INVALID_LINE;
use shardscan_protocol::PatternInfo;

const HUNK_HEADER: &str = "@@";
const FILE_HEADER: &str = "diff ";

/// Drops the per-file preamble (`diff …`, `index …`, `---`, `+++`) from a raw
/// diff and remaps `highlights` onto the remaining lines.
///
/// A preamble is everything before the first hunk header and everything from
/// a `diff ` line up to the next hunk header. Highlights that pointed into a
/// dropped line get [`INVALID_LINE`]; the others move up by the number of
/// lines dropped above them. Text without any hunk header is returned as is.
pub fn clean_diff(text: &str, highlights: &[Highlight]) -> HighlightedText {
    let lines: Vec<&str> = text.split('\n').collect();
    if !lines.iter().any(|line| line.starts_with(HUNK_HEADER)) {
        return HighlightedText {
            value: text.to_string(),
            highlights: highlights.to_vec(),
        };
    }

    // Per line: how many lines were dropped above it, and whether it was dropped.
    let mut removed_before = Vec::with_capacity(lines.len());
    let mut dropped = Vec::with_capacity(lines.len());
    let mut kept = Vec::with_capacity(lines.len());
    let mut removed = 0_i64;
    let mut in_preamble = true;

    for line in &lines {
        if line.starts_with(HUNK_HEADER) {
            in_preamble = false;
        } else if line.starts_with(FILE_HEADER) {
            in_preamble = true;
        }

        removed_before.push(removed);
        dropped.push(in_preamble);
        if in_preamble {
            removed += 1;
        } else {
            kept.push(*line);
        }
    }

    let highlights = highlights
        .iter()
        .map(|highlight| {
            let line = match usize::try_from(highlight.line) {
                Ok(idx) if dropped.get(idx).copied().unwrap_or(false) => INVALID_LINE,
                Ok(idx) => highlight.line - removed_before.get(idx).copied().unwrap_or(removed),
                Err(_) => INVALID_LINE,
            };
            Highlight { line, ..*highlight }
        })
        .collect();

    HighlightedText {
        value: kept.join("\n"),
        highlights,
    }
}

/// Compiled form of the query pattern, used to highlight commit messages.
#[derive(Debug, Clone)]
pub struct MessageMatcher {
    regex: Regex,
}

impl MessageMatcher {
    /// `None` for an empty pattern.
    pub fn new(pattern: &PatternInfo) -> Result<Option<Self>> {
        if pattern.is_empty() {
            return Ok(None);
        }
        let regex = RegexBuilder::new(&pattern_source(pattern))
            .case_insensitive(!pattern.case_sensitive)
            .build()?;
        Ok(Some(Self { regex }))
    }
}

/// Highlights every non-overlapping match of `matcher` on each line of
/// `message`. Offsets and lengths count characters, not bytes.
pub fn highlight_message(message: &str, matcher: Option<&MessageMatcher>) -> HighlightedText {
    let mut highlights = Vec::new();
    if let Some(matcher) = matcher {
        for (line_idx, line) in message.split('\n').enumerate() {
            for found in matcher.regex.find_iter(line) {
                if found.as_str().is_empty() {
                    continue;
                }
                highlights.push(Highlight::new(
                    line_idx as i64,
                    line[..found.start()].chars().count(),
                    found.as_str().chars().count(),
                ));
            }
        }
    }
    HighlightedText {
        value: message.to_string(),
        highlights,
    }
}
