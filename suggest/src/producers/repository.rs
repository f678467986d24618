use super::ProducerKind;
use super::SuggestionProducer;
use super::match_score;
use crate::backend::RepositoryCatalog;
use crate::error::ProducerError;
use crate::scope::SuggestionScope;
use async_trait::async_trait;
use shardscan_protocol::SuggestionItem;
use shardscan_protocol::SuggestionKind;
use std::sync::Arc;

/// Repository names matching the `repo:` term, or the bare pattern.
pub struct RepositoryProducer {
    catalog: Arc<dyn RepositoryCatalog>,
}

impl RepositoryProducer {
    pub fn new(catalog: Arc<dyn RepositoryCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SuggestionProducer for RepositoryProducer {
    fn kind(&self) -> ProducerKind {
        ProducerKind::Repository
    }

    async fn produce(
        &self,
        scope: &SuggestionScope,
        limit: usize,
    ) -> Result<Vec<SuggestionItem>, ProducerError> {
        let Some(term) = scope.input().repo_term() else {
            return Ok(Vec::new());
        };

        let names = self.catalog.search_names(term, limit).await?;
        Ok(names
            .into_iter()
            .take(limit)
            .map(|name| {
                let score = match_score(name.as_str(), term);
                SuggestionItem::new(SuggestionKind::Repository { name }, score)
            })
            .collect())
    }
}
