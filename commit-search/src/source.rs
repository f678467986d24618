//! Contracts of the external collaborators the pipeline consumes.

use crate::operation::SearchOperation;
use async_trait::async_trait;
use futures::stream::BoxStream;
use shardscan_protocol::RawMatchEvent;
use shardscan_protocol::RepoName;
use thiserror::Error;

/// Failures reported by the log/diff retrieval mechanism. Only the
/// structured variants are recognised as tolerable; anything else must be
/// reported as [`SourceError::Other`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("repository {repo} not found")]
    RepoNotFound { repo: RepoName },

    #[error("repository {repo} is still being cloned")]
    CloneInProgress {
        repo: RepoName,
        progress: Option<String>,
    },

    #[error("revision {spec:?} not found in repository {repo}")]
    RevisionNotFound { repo: RepoName, spec: String },

    #[error("search timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

pub type RawMatchStream = BoxStream<'static, Result<RawMatchEvent, SourceError>>;

/// Remote log/diff retrieval, one call per shard.
#[async_trait]
pub trait LogDiffSource: Send + Sync {
    async fn search(
        &self,
        repo: &RepoName,
        operation: &SearchOperation,
    ) -> Result<RawMatchStream, SourceError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Identity lookup used to expand `@username` references.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Verified email addresses of `username`, or `None` when no such user
    /// exists.
    async fn verified_emails(&self, username: &str) -> Result<Option<Vec<String>>, DirectoryError>;
}

/// Directory that knows no users; every reference passes through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUserDirectory;

#[async_trait]
impl UserDirectory for NoUserDirectory {
    async fn verified_emails(&self, _username: &str) -> Result<Option<Vec<String>>, DirectoryError> {
        Ok(None)
    }
}
