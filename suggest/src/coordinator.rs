use crate::backend::CodeIndex;
use crate::backend::ContextStore;
use crate::backend::RepositoryCatalog;
use crate::config::SuggestConfig;
use crate::error::ProducerError;
use crate::error::Result;
use crate::error::SuggestError;
use crate::producers::LanguageProducer;
use crate::producers::PathProducer;
use crate::producers::ProducerKind;
use crate::producers::RepositoryProducer;
use crate::producers::SavedContextProducer;
use crate::producers::SuggestionProducer;
use crate::producers::SymbolProducer;
use crate::producers::TextProducer;
use crate::query::SuggestionInput;
use crate::query::SuggestionQuery;
use crate::rank::rank;
use crate::scope::SuggestionScope;
use shardscan_protocol::SuggestionItem;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub query: SuggestionQuery,
    /// Requested number of suggestions; the configured default when unset.
    pub count: Option<usize>,
}

/// Runs a fixed list of producers in parallel and merges what they return.
#[derive(Clone)]
pub struct Suggester {
    config: Arc<SuggestConfig>,
    catalog: Arc<dyn RepositoryCatalog>,
    producers: Vec<Arc<dyn SuggestionProducer>>,
}

impl Suggester {
    /// Producer order matters: on duplicate suggestions the earlier
    /// producer's item is kept.
    pub fn new(
        config: SuggestConfig,
        catalog: Arc<dyn RepositoryCatalog>,
        producers: Vec<Arc<dyn SuggestionProducer>>,
    ) -> Result<Self> {
        config.validate().map_err(SuggestError::Config)?;
        Ok(Self {
            config: Arc::new(config),
            catalog,
            producers,
        })
    }

    /// Every built-in producer, most specific first.
    pub fn with_default_producers(
        config: SuggestConfig,
        catalog: Arc<dyn RepositoryCatalog>,
        index: Arc<dyn CodeIndex>,
        contexts: Arc<dyn ContextStore>,
    ) -> Result<Self> {
        let producers: Vec<Arc<dyn SuggestionProducer>> = vec![
            Arc::new(RepositoryProducer::new(Arc::clone(&catalog))),
            Arc::new(PathProducer::new(Arc::clone(&index))),
            Arc::new(SymbolProducer::new(Arc::clone(&index))),
            Arc::new(LanguageProducer::new(Arc::clone(&index))),
            Arc::new(SavedContextProducer::new(contexts)),
            Arc::new(TextProducer::new(index)),
        ];
        Self::new(config, catalog, producers)
    }

    pub fn config(&self) -> &SuggestConfig {
        &self.config
    }

    /// Ranked, deduplicated suggestions for `request`.
    ///
    /// Producers that time out, are cancelled, or reject the input count as
    /// empty. Any other producer failure is returned only when nothing
    /// succeeded.
    pub async fn suggest(
        &self,
        request: SuggestionRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<SuggestionItem>> {
        let input = match SuggestionInput::from_query(&request.query) {
            Ok(input) => input,
            Err(reason) => {
                debug!("skipping suggestions: {reason}");
                return Ok(Vec::new());
            }
        };
        let count = self.config.result_count(request.count);
        let scope = Arc::new(SuggestionScope::new(input, Arc::clone(&self.catalog)));
        let request_cancel = cancel.child_token();
        let _guard = request_cancel.clone().drop_guard();

        let running: Vec<(ProducerKind, JoinHandle<ProducerResult>)> = self
            .producers
            .iter()
            .map(|producer| {
                let kind = producer.kind();
                let handle = tokio::spawn(run_producer(
                    Arc::clone(producer),
                    Arc::clone(&scope),
                    count,
                    self.config.effective_timeout(kind),
                    request_cancel.clone(),
                ));
                (kind, handle)
            })
            .collect();

        let mut merged = Vec::new();
        let mut succeeded = 0usize;
        let mut first_error: Option<SuggestError> = None;
        for (kind, handle) in running {
            let outcome = handle.await.unwrap_or_else(|err| {
                Err(ProducerError::Backend(format!("producer task failed: {err}")))
            });
            match outcome {
                Ok(items) => {
                    succeeded += 1;
                    merged.extend(items);
                }
                Err(ProducerError::DeadlineExceeded) => {
                    warn!("{kind} suggestions timed out");
                    succeeded += 1;
                }
                Err(ProducerError::Cancelled) => {
                    debug!("{kind} suggestions cancelled");
                    succeeded += 1;
                }
                Err(ProducerError::InvalidInput(_)) => {
                    succeeded += 1;
                }
                Err(source) => {
                    let err = SuggestError::Producer {
                        producer: kind,
                        source,
                    };
                    if first_error.is_none() {
                        first_error = Some(err);
                    } else {
                        warn!("{err}");
                    }
                }
            }
        }

        let ranked = rank(merged, count);
        if let Some(err) = first_error {
            if ranked.is_empty() && succeeded == 0 {
                return Err(err);
            }
            warn!("returning partial suggestions: {err}");
        }
        Ok(ranked)
    }
}

type ProducerResult = std::result::Result<Vec<SuggestionItem>, ProducerError>;

async fn run_producer(
    producer: Arc<dyn SuggestionProducer>,
    scope: Arc<SuggestionScope>,
    limit: usize,
    timeout: Duration,
    cancel: CancellationToken,
) -> ProducerResult {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProducerError::Cancelled),
        res = tokio::time::timeout(timeout, producer.produce(&scope, limit)) => match res {
            Ok(outcome) => outcome,
            Err(_) => Err(ProducerError::DeadlineExceeded),
        },
    }
}
