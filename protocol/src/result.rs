use crate::query::CommitSearchMode;
use crate::repo::RepoName;
use crate::stats::AggregateStats;
use serde::Deserialize;
use serde::Serialize;
use serde_with::DurationMilliSeconds;
use serde_with::serde_as;
use serde_with::skip_serializing_none;
use std::time::Duration;
use strum_macros::Display;
use time::OffsetDateTime;

/// Line number carried by a highlight whose source line no longer exists in
/// the presented text.
pub const INVALID_LINE: i64 = -1;

/// A matched span: zero-based line, character offset within the line, and
/// length in characters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Highlight {
    pub line: i64,
    pub character: usize,
    pub length: usize,
}

impl Highlight {
    pub fn new(line: i64, character: usize, length: usize) -> Self {
        Self {
            line,
            character,
            length,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.line != INVALID_LINE
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HighlightedText {
    pub value: String,
    pub highlights: Vec<Highlight>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefKind {
    Head,
    Branch,
    Tag,
    Remote,
    Other,
}

/// A branch or tag pointing at a matched commit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResolvedRef {
    /// Short display name (`main`, `v1.2.0`).
    pub name: String,
    /// Fully qualified name (`refs/heads/main`).
    pub full_name: String,
    pub kind: RefKind,
}

impl ResolvedRef {
    /// Parses one log decoration. Accepts `HEAD -> refs/heads/x`,
    /// `tag: refs/tags/x`, fully qualified and bare names.
    pub fn from_decoration(decoration: &str) -> Option<Self> {
        let trimmed = decoration.trim();
        let without_head = trimmed.strip_prefix("HEAD -> ").unwrap_or(trimmed);
        let full_name = without_head
            .strip_prefix("tag: ")
            .unwrap_or(without_head)
            .trim();
        if full_name.is_empty() {
            return None;
        }
        let (kind, name) = if full_name == "HEAD" {
            (RefKind::Head, full_name)
        } else if let Some(rest) = full_name.strip_prefix("refs/heads/") {
            (RefKind::Branch, rest)
        } else if let Some(rest) = full_name.strip_prefix("refs/tags/") {
            (RefKind::Tag, rest)
        } else if let Some(rest) = full_name.strip_prefix("refs/remotes/") {
            (RefKind::Remote, rest)
        } else {
            (RefKind::Other, full_name)
        };
        Some(Self {
            name: name.to_string(),
            full_name: full_name.to_string(),
            kind,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitRef {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub author_date: OffsetDateTime,
    pub subject: String,
    pub url: String,
}

impl CommitRef {
    pub fn abbreviated_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(7)
            .map(|(idx, _)| idx)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// A displayable commit or diff match.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitSearchResult {
    pub repo: RepoName,
    pub commit: CommitRef,
    #[serde(default)]
    pub refs: Vec<ResolvedRef>,
    #[serde(default)]
    pub source_refs: Vec<ResolvedRef>,
    pub label: String,
    pub detail: String,
    pub message_preview: Option<HighlightedText>,
    pub diff_preview: Option<HighlightedText>,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchAlert {
    /// The search ran out of time before producing anything, or every
    /// searched repository timed out.
    Timeout {
        #[serde_as(as = "DurationMilliSeconds<u64>")]
        used: Duration,
        #[serde_as(as = "DurationMilliSeconds<u64>")]
        suggested: Duration,
    },
    /// Too many repositories for an unbounded commit or diff search.
    RepositoryLimitExceeded {
        mode: CommitSearchMode,
        limit: usize,
        matched: usize,
    },
}

impl SearchAlert {
    pub fn title(&self) -> String {
        match self {
            SearchAlert::Timeout { .. } => "Timed out while searching".to_string(),
            SearchAlert::RepositoryLimitExceeded { mode, .. } => {
                format!("Too many matching repositories for {mode} search to handle")
            }
        }
    }

    pub fn description(&self) -> String {
        match self {
            SearchAlert::Timeout { used, suggested } => format!(
                "The search timed out after {}ms. Try again with timeout:{}s.",
                used.as_millis(),
                suggested.as_secs()
            ),
            SearchAlert::RepositoryLimitExceeded {
                mode,
                limit,
                matched,
            } => format!(
                "{mode} search can only handle {limit} repositories at a time ({matched} matched). \
                 Narrow the repo: filter or add a before:/after: bound."
            ),
        }
    }
}

/// One incremental update on the result stream: new matches plus the
/// aggregate status observed so far.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchEvent {
    pub results: Vec<CommitSearchResult>,
    pub stats: AggregateStats,
}
