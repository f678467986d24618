use super::ProducerKind;
use super::SuggestionProducer;
use super::WEAK_MATCH;
use super::match_score;
use crate::backend::CodeIndex;
use crate::error::ProducerError;
use crate::scope::SuggestionScope;
use async_trait::async_trait;
use shardscan_protocol::SuggestionItem;
use shardscan_protocol::SuggestionKind;
use std::sync::Arc;

pub struct LanguageProducer {
    index: Arc<dyn CodeIndex>,
}

impl LanguageProducer {
    pub fn new(index: Arc<dyn CodeIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl SuggestionProducer for LanguageProducer {
    fn kind(&self) -> ProducerKind {
        ProducerKind::Language
    }

    async fn produce(
        &self,
        scope: &SuggestionScope,
        limit: usize,
    ) -> Result<Vec<SuggestionItem>, ProducerError> {
        let Some(term) = scope.input().lang_term() else {
            return Ok(Vec::new());
        };
        let repos = scope.repositories().await?;
        if repos.is_empty() {
            return Ok(Vec::new());
        }

        let languages = self.index.languages(repos).await?;
        Ok(languages
            .into_iter()
            .filter_map(|name| {
                let score = match_score(&name, term);
                (score > WEAK_MATCH)
                    .then(|| SuggestionItem::new(SuggestionKind::Language { name }, score))
            })
            .take(limit)
            .collect())
    }
}
