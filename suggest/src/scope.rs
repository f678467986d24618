use crate::backend::BackendError;
use crate::backend::RepositoryCatalog;
use crate::backend::RepositoryRevision;
use crate::query::SuggestionInput;
use shardscan_async_utils::SingleFlight;
use std::sync::Arc;

/// Per-request state shared by every producer of one suggestion request.
///
/// Repository resolution is the one read most producers need; it runs at
/// most once per request and every producer sees the same outcome.
pub struct SuggestionScope {
    input: SuggestionInput,
    catalog: Arc<dyn RepositoryCatalog>,
    repositories: SingleFlight<Vec<RepositoryRevision>, BackendError>,
}

impl SuggestionScope {
    pub fn new(input: SuggestionInput, catalog: Arc<dyn RepositoryCatalog>) -> Self {
        Self {
            input,
            catalog,
            repositories: SingleFlight::new(),
        }
    }

    pub fn input(&self) -> &SuggestionInput {
        &self.input
    }

    pub async fn repositories(&self) -> Result<&[RepositoryRevision], BackendError> {
        let repos = self
            .repositories
            .get_or_init(|| self.catalog.resolve(&self.input))
            .await?;
        Ok(repos.as_slice())
    }
}
