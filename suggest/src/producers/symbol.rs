use super::ProducerKind;
use super::SuggestionProducer;
use super::match_score;
use crate::backend::CodeIndex;
use crate::backend::SymbolMatch;
use crate::error::ProducerError;
use crate::scope::SuggestionScope;
use async_trait::async_trait;
use shardscan_protocol::SuggestionItem;
use shardscan_protocol::SuggestionKind;
use std::sync::Arc;

/// Symbol definitions whose name matches the pattern.
pub struct SymbolProducer {
    index: Arc<dyn CodeIndex>,
}

impl SymbolProducer {
    pub fn new(index: Arc<dyn CodeIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl SuggestionProducer for SymbolProducer {
    fn kind(&self) -> ProducerKind {
        ProducerKind::Symbol
    }

    async fn produce(
        &self,
        scope: &SuggestionScope,
        limit: usize,
    ) -> Result<Vec<SuggestionItem>, ProducerError> {
        let Some(term) = scope.input().pattern_term() else {
            return Ok(Vec::new());
        };
        let repos = scope.repositories().await?;
        if repos.is_empty() {
            return Ok(Vec::new());
        }

        let symbols = self.index.search_symbols(repos, term, limit).await?;
        Ok(symbols
            .into_iter()
            .take(limit)
            .map(|symbol| to_item(symbol, term))
            .collect())
    }
}

fn to_item(symbol: SymbolMatch, term: &str) -> SuggestionItem {
    let score = match_score(&symbol.name, term);
    let url = format!(
        "/{}@{}/-/blob/{}#L{}",
        symbol.repo, symbol.rev, symbol.path, symbol.line
    );
    SuggestionItem::new(
        SuggestionKind::Symbol {
            name: symbol.name,
            kind: symbol.kind,
            container: symbol.container,
            url,
        },
        score,
    )
}
