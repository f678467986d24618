//! Contracts of the stores the suggestion producers read from.

use crate::query::SuggestionInput;
use async_trait::async_trait;
use shardscan_protocol::RepoName;
use shardscan_protocol::SymbolKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend rejected the term, e.g. an invalid regex.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A repository at the revision suggestions should point into.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepositoryRevision {
    pub repo: RepoName,
    pub rev: String,
}

impl RepositoryRevision {
    pub fn new(repo: impl Into<RepoName>, rev: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            rev: rev.into(),
        }
    }
}

#[async_trait]
pub trait RepositoryCatalog: Send + Sync {
    /// Repositories matched by the input's repo filters and revision.
    async fn resolve(
        &self,
        input: &SuggestionInput,
    ) -> Result<Vec<RepositoryRevision>, BackendError>;

    /// Repository names matching `term`, best matches first.
    async fn search_names(&self, term: &str, limit: usize) -> Result<Vec<RepoName>, BackendError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathMatch {
    pub repo: RepoName,
    pub rev: String,
    pub path: String,
    pub is_dir: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolMatch {
    pub repo: RepoName,
    pub rev: String,
    pub path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub container: Option<String>,
    /// One-based line of the definition.
    pub line: u32,
}

/// A file with at least one full-text hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMatch {
    pub repo: RepoName,
    pub rev: String,
    pub path: String,
    pub hits: usize,
}

/// Index-backed search over the contents of resolved repositories.
#[async_trait]
pub trait CodeIndex: Send + Sync {
    async fn search_paths(
        &self,
        repos: &[RepositoryRevision],
        term: &str,
        limit: usize,
    ) -> Result<Vec<PathMatch>, BackendError>;

    async fn search_symbols(
        &self,
        repos: &[RepositoryRevision],
        term: &str,
        limit: usize,
    ) -> Result<Vec<SymbolMatch>, BackendError>;

    async fn search_text(
        &self,
        repos: &[RepositoryRevision],
        pattern: &str,
        is_regex: bool,
        limit: usize,
    ) -> Result<Vec<TextMatch>, BackendError>;

    /// Languages present in `repos`.
    async fn languages(&self, repos: &[RepositoryRevision]) -> Result<Vec<String>, BackendError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedContext {
    pub spec: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn search_contexts(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<SavedContext>, BackendError>;
}
