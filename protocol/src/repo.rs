use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Revspec naming a repository's default branch.
pub const DEFAULT_REVISION: &str = "HEAD";

/// Display name of a repository, e.g. `github.com/acme/api`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RepoName(String);

impl RepoName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepoName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RevisionSelector {
    /// A single revspec such as `main`, `v1.2.0` or a commit id.
    Exact(String),
    /// Every ref matching the glob, e.g. `refs/heads/release/*`.
    RefGlob(String),
    /// Refs matching the glob are removed from the preceding globs.
    ExcludeRefGlob(String),
}

impl RevisionSelector {
    pub fn default_branch() -> Self {
        RevisionSelector::Exact(DEFAULT_REVISION.to_string())
    }

    /// An exact revision the caller asked for, as opposed to the default
    /// branch or a ref glob.
    pub fn is_pin(&self) -> bool {
        matches!(self, RevisionSelector::Exact(spec) if spec != DEFAULT_REVISION)
    }

    /// The raw text handed to the retrieval mechanism.
    pub fn text(&self) -> &str {
        match self {
            RevisionSelector::Exact(spec)
            | RevisionSelector::RefGlob(spec)
            | RevisionSelector::ExcludeRefGlob(spec) => spec,
        }
    }
}

/// One shard of commit search work: a repository plus the revisions to walk.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryRevisions {
    pub repo: RepoName,
    #[serde(default)]
    pub revs: Vec<RevisionSelector>,
}

impl RepositoryRevisions {
    pub fn new(repo: impl Into<RepoName>, revs: Vec<RevisionSelector>) -> Self {
        Self {
            repo: repo.into(),
            revs,
        }
    }

    pub fn pins_exact_revision(&self) -> bool {
        self.revs.iter().any(RevisionSelector::is_pin)
    }

    pub fn is_empty(&self) -> bool {
        self.revs.is_empty()
    }
}

/// Result of resolving the query's repository and revision filters.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedRepositories {
    pub searchable: Vec<RepositoryRevisions>,
    /// Revisions the resolver was asked for but could not find.
    #[serde(default)]
    pub missing_revisions: Vec<RepositoryRevisions>,
}

impl From<&str> for RepositoryRevisions {
    fn from(value: &str) -> Self {
        Self::new(value, Vec::new())
    }
}

impl From<String> for RepoName {
    fn from(value: String) -> Self {
        Self(value)
    }
}
