/*!
# Suggest

Best-effort search suggestions from several independent producers.

## Architecture

```text
SuggestionRequest
  ├─> SuggestionInput::from_query   (type:, predicates, or ⇒ no suggestions)
  ├─> SuggestionScope               (repositories resolved once, shared)
  └─> producer × N  (own timeout, capped by the overall one)
        repository · path · symbol · language · saved context · text
              │
              └─> concatenate in producer order
                    └─> dedup by key (first wins) → sort → truncate
```

A producer that times out, is cancelled, or cannot handle the input
contributes nothing. Other producer failures are logged, and only returned
when no producer succeeded at all.
*/

mod backend;
mod config;
mod coordinator;
mod error;
mod producers;
mod query;
mod rank;
mod scope;

pub use backend::BackendError;
pub use backend::CodeIndex;
pub use backend::ContextStore;
pub use backend::PathMatch;
pub use backend::RepositoryCatalog;
pub use backend::RepositoryRevision;
pub use backend::SavedContext;
pub use backend::SymbolMatch;
pub use backend::TextMatch;
pub use config::SuggestConfig;
pub use coordinator::SuggestionRequest;
pub use coordinator::Suggester;
pub use error::ProducerError;
pub use error::Result;
pub use error::SuggestError;
pub use producers::EXACT_MATCH;
pub use producers::LanguageProducer;
pub use producers::MIN_TEXT_PATTERN_CHARS;
pub use producers::PREFIX_MATCH;
pub use producers::PathProducer;
pub use producers::ProducerKind;
pub use producers::RepositoryProducer;
pub use producers::SUBSTRING_MATCH;
pub use producers::SavedContextProducer;
pub use producers::SuggestionProducer;
pub use producers::SymbolProducer;
pub use producers::TextProducer;
pub use producers::WEAK_MATCH;
pub use query::SuggestionInput;
pub use query::SuggestionQuery;
pub use query::Unsuggestable;
pub use rank::compare;
pub use rank::rank;
pub use scope::SuggestionScope;
