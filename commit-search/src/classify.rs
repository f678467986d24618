use crate::source::SourceError;
use crate::worker::ShardStatus;

/// What a shard's terminal message means for the request.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ShardDisposition {
    Searched(ShardStatus),
    Cloning,
    Missing,
    TimedOut,
    Fatal(SourceError),
}

/// Sorts a shard outcome into tolerated conditions and request failures.
///
/// Only the error shapes listed here are tolerated; anything unrecognised is
/// fatal. A missing revision is tolerated only when the shard searched its
/// default revision rather than one the caller pinned.
pub(crate) fn classify(outcome: Result<ShardStatus, SourceError>, pinned: bool) -> ShardDisposition {
    match outcome {
        Ok(status) => ShardDisposition::Searched(status),
        Err(SourceError::CloneInProgress { .. }) => ShardDisposition::Cloning,
        Err(SourceError::RepoNotFound { .. }) => ShardDisposition::Missing,
        Err(SourceError::RevisionNotFound { .. }) if !pinned => ShardDisposition::Missing,
        Err(SourceError::Timeout) => ShardDisposition::TimedOut,
        Err(err) => ShardDisposition::Fatal(err),
    }
}
