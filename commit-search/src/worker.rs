use crate::highlight::MessageMatcher;
use crate::operation::SearchOperation;
use crate::render::to_result;
use crate::source::LogDiffSource;
use crate::source::RawMatchStream;
use crate::source::SourceError;
use futures::StreamExt;
use shardscan_async_utils::OrCancelExt;
use shardscan_protocol::CommitSearchResult;
use shardscan_protocol::RepoName;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a shard's search ended when it did not fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ShardStatus {
    /// Matches forwarded to the merge loop.
    pub matches: usize,
    /// More matches existed than the cap allowed.
    pub limit_hit: bool,
    /// The stream reported an incomplete read, or the shard was stopped by
    /// its deadline or by cancellation.
    pub timed_out: bool,
}

pub(crate) enum WorkerMessage {
    Batch {
        repo: RepoName,
        results: Vec<CommitSearchResult>,
    },
    /// Sent exactly once per worker, after its last batch.
    Done {
        repo: RepoName,
        pinned: bool,
        outcome: Result<ShardStatus, SourceError>,
    },
}

/// Searches one shard and reports back to the merge loop.
pub(crate) struct ShardWorker {
    pub repo: RepoName,
    pub operation: SearchOperation,
    pub source: Arc<dyn LogDiffSource>,
    pub matcher: Option<Arc<MessageMatcher>>,
    pub batch_size: usize,
    pub shard_timeout: Option<Duration>,
    pub cancel: CancellationToken,
    pub tx: mpsc::Sender<WorkerMessage>,
}

enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

impl ShardWorker {
    pub(crate) async fn run(self) {
        debug!(
            "searching {} ({} mode, limit {})",
            self.repo, self.operation.mode, self.operation.limit
        );
        let outcome = self.search().await;
        match &outcome {
            Ok(status) => debug!("finished {}: {status:?}", self.repo),
            Err(err) => debug!("search in {} failed: {err}", self.repo),
        }
        // The merge loop drains until every sender is gone, so this cannot
        // block forever.
        let _ = self
            .tx
            .send(WorkerMessage::Done {
                repo: self.repo.clone(),
                pinned: self.operation.pins_exact_revision(),
                outcome,
            })
            .await;
    }

    async fn search(&self) -> Result<ShardStatus, SourceError> {
        let deadline = self.shard_timeout.map(|timeout| Instant::now() + timeout);
        let mut status = ShardStatus::default();

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = wait_for(deadline) => Err(Interrupt::DeadlineExceeded),
            opened = self.source.search(&self.repo, &self.operation) => Ok(opened?),
        };
        let mut stream: RawMatchStream = match opened {
            Ok(stream) => stream,
            Err(interrupt) => {
                self.log_interrupt(&interrupt);
                status.timed_out = true;
                return Ok(status);
            }
        };

        let cap = self.operation.limit.saturating_sub(1);
        let mut seen = 0_usize;
        let mut batch = Vec::with_capacity(self.batch_size);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
                _ = wait_for(deadline) => Err(Interrupt::DeadlineExceeded),
                next = stream.next() => Ok(next),
            };
            let event = match next {
                Ok(Some(Ok(event))) => event,
                Ok(Some(Err(err))) => {
                    self.flush(&mut batch, &mut status).await;
                    return Err(err);
                }
                Ok(None) => break,
                Err(interrupt) => {
                    self.log_interrupt(&interrupt);
                    status.timed_out = true;
                    break;
                }
            };

            if !event.complete {
                status.timed_out = true;
            }
            seen += 1;
            if seen > cap {
                status.limit_hit = true;
                break;
            }

            batch.push(to_result(
                &self.repo,
                event,
                self.operation.mode,
                self.matcher.as_deref(),
            ));
            if batch.len() >= self.batch_size && !self.flush(&mut batch, &mut status).await {
                break;
            }
        }

        self.flush(&mut batch, &mut status).await;
        Ok(status)
    }

    /// Forwards the pending batch. Returns false when the merge loop is gone
    /// or the request was cancelled while waiting for channel capacity.
    async fn flush(&self, batch: &mut Vec<CommitSearchResult>, status: &mut ShardStatus) -> bool {
        if batch.is_empty() {
            return true;
        }
        let results = std::mem::take(batch);
        let count = results.len();
        let message = WorkerMessage::Batch {
            repo: self.repo.clone(),
            results,
        };
        match self.tx.send(message).or_cancel(&self.cancel).await {
            Ok(Ok(())) => {
                status.matches += count;
                true
            }
            Ok(Err(_closed)) => false,
            Err(_cancelled) => {
                status.timed_out = true;
                false
            }
        }
    }

    fn log_interrupt(&self, interrupt: &Interrupt) {
        match interrupt {
            Interrupt::Cancelled => debug!("search in {} cancelled", self.repo),
            Interrupt::DeadlineExceeded => debug!("search in {} hit its shard deadline", self.repo),
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
