use crate::result::Highlight;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawCommit {
    pub id: String,
    pub author: Signature,
    #[serde(default)]
    pub committer: Option<Signature>,
    pub message: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl RawCommit {
    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Diff text as produced by the retrieval mechanism, with the spans it
/// reported as matching. Lines still include the per-file preamble.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawDiff {
    pub text: String,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
}

/// One match streamed back by the log/diff retrieval mechanism.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawMatchEvent {
    pub commit: RawCommit,
    #[serde(default)]
    pub diff: Option<RawDiff>,
    /// Decorations such as `HEAD -> refs/heads/main` or `tag: refs/tags/v1`.
    #[serde(default)]
    pub ref_names: Vec<String>,
    /// Refs the commit was reached from when walking globbed revisions.
    #[serde(default)]
    pub source_refs: Vec<String>,
    /// False when the retrieval was truncated or timed out before finishing.
    #[serde(default = "default_complete")]
    pub complete: bool,
}

fn default_complete() -> bool {
    true
}
