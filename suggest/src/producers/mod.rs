//! Independent suggestion strategies. Each one is a function of the query
//! plus a single backend read.

mod language;
mod path;
mod repository;
mod saved_context;
mod symbol;
mod text;

use crate::error::ProducerError;
use crate::scope::SuggestionScope;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use shardscan_protocol::SuggestionItem;
use strum_macros::Display;

pub use language::LanguageProducer;
pub use path::PathProducer;
pub use repository::RepositoryProducer;
pub use saved_context::SavedContextProducer;
pub use symbol::SymbolProducer;
pub use text::MIN_TEXT_PATTERN_CHARS;
pub use text::TextProducer;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProducerKind {
    Repository,
    Path,
    Language,
    Symbol,
    Text,
    SavedContext,
}

impl ProducerKind {
    pub const ALL: [ProducerKind; 6] = [
        ProducerKind::Repository,
        ProducerKind::Path,
        ProducerKind::Language,
        ProducerKind::Symbol,
        ProducerKind::Text,
        ProducerKind::SavedContext,
    ];
}

#[async_trait]
pub trait SuggestionProducer: Send + Sync {
    fn kind(&self) -> ProducerKind;

    /// At most `limit` suggestions for the request in `scope`.
    async fn produce(
        &self,
        scope: &SuggestionScope,
        limit: usize,
    ) -> Result<Vec<SuggestionItem>, ProducerError>;
}

pub const EXACT_MATCH: i32 = 100;
pub const PREFIX_MATCH: i32 = 50;
pub const SUBSTRING_MATCH: i32 = 10;
/// The backend reported a match the term does not literally contain
/// (regex, fuzzy, or full-text hit).
pub const WEAK_MATCH: i32 = 1;

/// Case-insensitive score of `candidate` against `term`.
pub(crate) fn match_score(candidate: &str, term: &str) -> i32 {
    let candidate = candidate.to_lowercase();
    let term = term.to_lowercase();
    if candidate == term {
        EXACT_MATCH
    } else if candidate.starts_with(&term) {
        PREFIX_MATCH
    } else if candidate.contains(&term) {
        SUBSTRING_MATCH
    } else {
        WEAK_MATCH
    }
}
