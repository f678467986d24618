use crate::source::DirectoryError;
use crate::source::SourceError;
use shardscan_protocol::CommitSearchMode;
use shardscan_protocol::RepoName;
use strum_macros::Display;
use thiserror::Error;

/// Grep-like fields translated into the retrieval mechanism's text filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum GrepField {
    Message,
    Author,
    Committer,
}

#[derive(Error, Debug)]
pub enum CommitSearchError {
    #[error("invalid git revision spec {spec:?} (begins with '-')")]
    InvalidRevspec { spec: String },

    #[error("{field}: filter cannot both require and exclude values")]
    UnsupportedFilterCombination { field: GrepField },

    #[error("failed to expand user reference {username:?}: {source}")]
    UserLookup {
        username: String,
        #[source]
        source: DirectoryError,
    },

    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error(r#"invalid "timeout:" value {value:?} (examples: "timeout:2s", "timeout:200ms")"#)]
    InvalidTimeout { value: String },

    #[error("revision {spec:?} not found in repository {repo}")]
    RevisionNotFound { repo: RepoName, spec: String },

    #[error("{mode} search failed in repository {repo}: {source}")]
    Shard {
        repo: RepoName,
        mode: CommitSearchMode,
        #[source]
        source: SourceError,
    },

    #[error("{mode} search worker for repository {repo} panicked: {message}")]
    ShardPanicked {
        repo: RepoName,
        mode: CommitSearchMode,
        message: String,
    },

    #[error("shard worker failed: {0}")]
    Worker(String),

    #[error("search cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CommitSearchError>;
