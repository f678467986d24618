use super::ProducerKind;
use super::SuggestionProducer;
use super::match_score;
use crate::backend::ContextStore;
use crate::error::ProducerError;
use crate::scope::SuggestionScope;
use async_trait::async_trait;
use shardscan_protocol::SuggestionItem;
use shardscan_protocol::SuggestionKind;
use std::sync::Arc;

/// Saved search contexts matching the `context:` value or the pattern.
pub struct SavedContextProducer {
    store: Arc<dyn ContextStore>,
}

impl SavedContextProducer {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SuggestionProducer for SavedContextProducer {
    fn kind(&self) -> ProducerKind {
        ProducerKind::SavedContext
    }

    async fn produce(
        &self,
        scope: &SuggestionScope,
        limit: usize,
    ) -> Result<Vec<SuggestionItem>, ProducerError> {
        let input = scope.input();
        let term = input
            .context
            .as_deref()
            .filter(|context| !context.is_empty())
            .or_else(|| input.pattern_term());
        let Some(term) = term else {
            return Ok(Vec::new());
        };

        let contexts = self.store.search_contexts(term, limit).await?;
        Ok(contexts
            .into_iter()
            .take(limit)
            .map(|context| {
                let score = match_score(&context.spec, term);
                SuggestionItem::new(
                    SuggestionKind::SavedContext {
                        spec: context.spec,
                        description: context.description,
                    },
                    score,
                )
            })
            .collect())
    }
}
