//! Request-scoped data model shared by the commit search pipeline and the
//! suggestion aggregator. Nothing in here outlives a single request.

mod event;
mod query;
mod repo;
mod result;
mod stats;
mod suggestion;

pub use event::RawCommit;
pub use event::RawDiff;
pub use event::RawMatchEvent;
pub use event::Signature;
pub use query::CommitSearchMode;
pub use query::CommitSearchQuery;
pub use query::FieldFilter;
pub use query::PatternInfo;
pub use repo::DEFAULT_REVISION;
pub use repo::RepoName;
pub use repo::RepositoryRevisions;
pub use repo::ResolvedRepositories;
pub use repo::RevisionSelector;
pub use result::CommitRef;
pub use result::CommitSearchResult;
pub use result::Highlight;
pub use result::HighlightedText;
pub use result::INVALID_LINE;
pub use result::RefKind;
pub use result::ResolvedRef;
pub use result::SearchAlert;
pub use result::SearchEvent;
pub use stats::AggregateStats;
pub use suggestion::SuggestionItem;
pub use suggestion::SuggestionKey;
pub use suggestion::SuggestionKind;
pub use suggestion::SymbolKind;
