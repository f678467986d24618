use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommitSearchMode {
    /// Match the pattern against the changed lines of each commit.
    #[default]
    Diff,
    /// Match the pattern against commit messages only.
    Log,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PatternInfo {
    pub text: String,
    pub is_regex: bool,
    pub case_sensitive: bool,
}

impl PatternInfo {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_regex: false,
            case_sensitive: false,
        }
    }

    pub fn regex(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_regex: true,
            case_sensitive: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Positive and negated values for one grep-like field (`message:`,
/// `author:`, `committer:`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FieldFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl FieldFilter {
    pub fn including<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: values.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn excluding<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: Vec::new(),
            exclude: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Structured description of a commit or diff search.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CommitSearchQuery {
    pub pattern: PatternInfo,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub message: FieldFilter,
    pub author: FieldFilter,
    pub committer: FieldFilter,
    /// Upper time bound, passed through verbatim (e.g. `2 weeks ago`).
    pub before: Option<String>,
    /// Lower time bound, passed through verbatim.
    pub after: Option<String>,
    pub mode: CommitSearchMode,
    /// Explicit `count:` cap on results.
    pub count: Option<usize>,
    /// Pagination size; used as the cap when `count` is unset.
    pub first: Option<usize>,
    /// Raw `timeout:` value such as `2s` or `200ms`.
    pub timeout: Option<String>,
}

impl CommitSearchQuery {
    pub fn has_time_bound(&self) -> bool {
        self.before.is_some() || self.after.is_some()
    }

    /// Result cap for this query. An explicit `count:` wins over pagination.
    pub fn result_limit(&self, default_limit: usize) -> usize {
        self.count.or(self.first).unwrap_or(default_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn count_wins_over_first() {
        let query = CommitSearchQuery {
            count: Some(7),
            first: Some(30),
            ..Default::default()
        };
        assert_eq!(query.result_limit(50), 7);

        let paged = CommitSearchQuery {
            first: Some(30),
            ..Default::default()
        };
        assert_eq!(paged.result_limit(50), 30);
        assert_eq!(CommitSearchQuery::default().result_limit(50), 50);
    }

    #[test]
    fn mode_renders_snake_case() {
        assert_eq!(CommitSearchMode::Diff.to_string(), "diff");
        assert_eq!(CommitSearchMode::Log.to_string(), "log");
    }
}
