use super::ProducerKind;
use super::SuggestionProducer;
use super::match_score;
use crate::backend::CodeIndex;
use crate::backend::PathMatch;
use crate::error::ProducerError;
use crate::scope::SuggestionScope;
use async_trait::async_trait;
use shardscan_protocol::SuggestionItem;
use shardscan_protocol::SuggestionKind;
use std::sync::Arc;

/// Files and directories whose path matches the `file:` term or the pattern.
pub struct PathProducer {
    index: Arc<dyn CodeIndex>,
}

impl PathProducer {
    pub fn new(index: Arc<dyn CodeIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl SuggestionProducer for PathProducer {
    fn kind(&self) -> ProducerKind {
        ProducerKind::Path
    }

    async fn produce(
        &self,
        scope: &SuggestionScope,
        limit: usize,
    ) -> Result<Vec<SuggestionItem>, ProducerError> {
        let Some(term) = scope.input().path_term() else {
            return Ok(Vec::new());
        };
        let repos = scope.repositories().await?;
        if repos.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self.index.search_paths(repos, term, limit).await?;
        Ok(matches
            .into_iter()
            .take(limit)
            .map(|found| to_item(found, term))
            .collect())
    }
}

fn to_item(found: PathMatch, term: &str) -> SuggestionItem {
    let trimmed = found.path.trim_end_matches('/');
    let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
    // A hit on the file name outranks one buried in a parent directory.
    let score = match_score(base, term).max(match_score(&found.path, term));
    let PathMatch {
        repo,
        rev,
        path,
        is_dir,
    } = found;
    let kind = if is_dir {
        SuggestionKind::Tree { repo, rev, path }
    } else {
        SuggestionKind::Blob { repo, rev, path }
    };
    SuggestionItem::new(kind, score)
}
