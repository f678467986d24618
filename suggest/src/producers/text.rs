use super::ProducerKind;
use super::SuggestionProducer;
use super::WEAK_MATCH;
use crate::backend::CodeIndex;
use crate::error::ProducerError;
use crate::scope::SuggestionScope;
use async_trait::async_trait;
use shardscan_protocol::SuggestionItem;
use shardscan_protocol::SuggestionKind;
use std::sync::Arc;

/// Shorter patterns match nearly every file.
pub const MIN_TEXT_PATTERN_CHARS: usize = 3;

/// Files whose contents match the pattern.
pub struct TextProducer {
    index: Arc<dyn CodeIndex>,
}

impl TextProducer {
    pub fn new(index: Arc<dyn CodeIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl SuggestionProducer for TextProducer {
    fn kind(&self) -> ProducerKind {
        ProducerKind::Text
    }

    async fn produce(
        &self,
        scope: &SuggestionScope,
        limit: usize,
    ) -> Result<Vec<SuggestionItem>, ProducerError> {
        let input = scope.input();
        let pattern = input.pattern.as_str();
        if pattern.chars().count() < MIN_TEXT_PATTERN_CHARS {
            return Err(ProducerError::InvalidInput(format!(
                "pattern {pattern:?} is shorter than {MIN_TEXT_PATTERN_CHARS} characters"
            )));
        }
        let repos = scope.repositories().await?;
        if repos.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self
            .index
            .search_text(repos, pattern, input.is_regex, limit)
            .await?;
        Ok(hits
            .into_iter()
            .take(limit)
            .map(|hit| {
                SuggestionItem::new(
                    SuggestionKind::Path {
                        repo: hit.repo,
                        rev: hit.rev,
                        path: hit.path,
                    },
                    WEAK_MATCH,
                )
            })
            .collect())
    }
}
