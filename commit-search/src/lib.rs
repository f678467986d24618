/*!
# Commit Search

Concurrent commit and diff search over many repository shards.

A request names a set of resolved repositories and a structured query. Each
shard gets its own worker that streams matches from a [`LogDiffSource`];
workers report to a single merge loop, which forwards incremental
[`SearchEvent`](shardscan_protocol::SearchEvent)s to the caller and folds
per-shard conditions into [`AggregateStats`](shardscan_protocol::AggregateStats).

## Architecture

```text
CommitSearchRequest
  ├─> GrepFilters::resolve      (@user → verified emails)
  ├─> SearchOperation::for_shard (one per shard, limit N+1)
  └─> ShardWorker × shards  ──mpsc──>  merge loop
        │  LogDiffSource stream           ├─> SearchEvent batches (≤ N)
        │  clean_diff / highlight_message  ├─> AggregateStats
        └─> one terminal message           └─> sort by author date, truncate N
```

## Failure handling

- Repositories that are cloning, missing, or timed out are recorded in the
  stats and do not fail the request.
- Any other shard error cancels the remaining shards and fails the request,
  wrapped with the shard's repository and search mode. A panicking shard
  worker is handled the same way.
- A missing revision that the caller pinned explicitly fails the request
  before anything is dispatched.
*/

mod classify;
mod config;
mod coordinator;
mod deadline;
mod error;
mod highlight;
mod operation;
mod render;
mod source;
mod worker;

pub use config::CommitSearchConfig;
pub use coordinator::CommitSearchOutcome;
pub use coordinator::CommitSearchRequest;
pub use coordinator::CommitSearchStream;
pub use coordinator::CommitSearcher;
pub use coordinator::SearchStatus;
pub use deadline::MIN_SUGGESTED_TIMEOUT;
pub use deadline::longer;
pub use deadline::parse_timeout;
pub use error::CommitSearchError;
pub use error::GrepField;
pub use error::Result;
pub use highlight::MessageMatcher;
pub use highlight::clean_diff;
pub use highlight::highlight_message;
pub use operation::GrepFilter;
pub use operation::GrepFilters;
pub use operation::SearchOperation;
pub use source::DirectoryError;
pub use source::LogDiffSource;
pub use source::NoUserDirectory;
pub use source::RawMatchStream;
pub use source::SourceError;
pub use source::UserDirectory;
