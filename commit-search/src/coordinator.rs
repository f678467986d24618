use crate::classify::ShardDisposition;
use crate::classify::classify;
use crate::config::CommitSearchConfig;
use crate::deadline::longer;
use crate::error::CommitSearchError;
use crate::error::Result;
use crate::highlight::MessageMatcher;
use crate::operation::GrepFilters;
use crate::operation::SearchOperation;
use crate::source::LogDiffSource;
use crate::source::SourceError;
use crate::source::UserDirectory;
use crate::worker::ShardStatus;
use crate::worker::ShardWorker;
use crate::worker::WorkerMessage;
use serde::Serialize;
use shardscan_async_utils::OrCancelExt;
use shardscan_protocol::AggregateStats;
use shardscan_protocol::CommitSearchMode;
use shardscan_protocol::CommitSearchQuery;
use shardscan_protocol::CommitSearchResult;
use shardscan_protocol::RepoName;
use shardscan_protocol::RepositoryRevisions;
use shardscan_protocol::ResolvedRepositories;
use shardscan_protocol::SearchAlert;
use shardscan_protocol::SearchEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::Display;
use tokio::sync::mpsc;
use tokio::task;
use tokio::task::JoinError;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::sync::DropGuard;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// A commit or diff search over already resolved repositories.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitSearchRequest {
    pub query: CommitSearchQuery,
    pub repos: ResolvedRepositories,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchStatus {
    Success,
    Error,
    /// The request produced nothing before running out of time.
    Timeout,
    /// Some repositories timed out; results from the others are complete.
    PartialTimeout,
}

impl SearchStatus {
    pub fn of(result: &Result<CommitSearchOutcome>) -> Self {
        match result {
            Ok(outcome) => outcome.status(),
            Err(_) => SearchStatus::Error,
        }
    }
}

/// Final, globally ordered result of a search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitSearchOutcome {
    /// Newest first, at most the requested count.
    pub results: Vec<CommitSearchResult>,
    pub stats: AggregateStats,
    pub alert: Option<SearchAlert>,
    pub elapsed: Duration,
}

impl CommitSearchOutcome {
    pub fn status(&self) -> SearchStatus {
        if matches!(self.alert, Some(SearchAlert::Timeout { .. })) {
            SearchStatus::Timeout
        } else if !self.stats.timed_out.is_empty() {
            SearchStatus::PartialTimeout
        } else {
            SearchStatus::Success
        }
    }
}

/// Fans commit and diff searches out over repository shards.
#[derive(Clone)]
pub struct CommitSearcher {
    config: Arc<CommitSearchConfig>,
    source: Arc<dyn LogDiffSource>,
    users: Arc<dyn UserDirectory>,
}

impl CommitSearcher {
    pub fn new(
        config: CommitSearchConfig,
        source: Arc<dyn LogDiffSource>,
        users: Arc<dyn UserDirectory>,
    ) -> Result<Self> {
        config.validate().map_err(CommitSearchError::Config)?;
        Ok(Self {
            config: Arc::new(config),
            source,
            users,
        })
    }

    pub fn config(&self) -> &CommitSearchConfig {
        &self.config
    }

    /// Starts a search and returns its incremental event stream.
    ///
    /// Cancelling `cancel` (or dropping the stream) stops every shard. The
    /// caller must keep reading events, or call
    /// [`CommitSearchStream::finish`], for the search to make progress.
    pub fn stream(
        &self,
        request: CommitSearchRequest,
        cancel: &CancellationToken,
    ) -> CommitSearchStream {
        let request_cancel = cancel.child_token();
        let (events_tx, events_rx) = mpsc::channel(self.config.channel_capacity);
        let fan_out = FanOut {
            config: Arc::clone(&self.config),
            source: Arc::clone(&self.source),
            users: Arc::clone(&self.users),
            cancel: request_cancel.clone(),
            caller_cancel: cancel.clone(),
            events: events_tx,
        };
        CommitSearchStream {
            events: events_rx,
            handle: tokio::spawn(fan_out.run(request)),
            _guard: request_cancel.drop_guard(),
        }
    }

    /// Runs a search to completion, discarding the incremental events.
    pub async fn search(
        &self,
        request: CommitSearchRequest,
        cancel: &CancellationToken,
    ) -> Result<CommitSearchOutcome> {
        self.stream(request, cancel).finish().await
    }
}

/// Incremental view of a running search.
pub struct CommitSearchStream {
    events: mpsc::Receiver<SearchEvent>,
    handle: JoinHandle<Result<CommitSearchOutcome>>,
    _guard: DropGuard,
}

impl CommitSearchStream {
    /// Next batch of matches, or `None` once the search stopped producing.
    pub async fn next(&mut self) -> Option<SearchEvent> {
        self.events.recv().await
    }

    /// Drains any unread events and waits for the final outcome.
    pub async fn finish(self) -> Result<CommitSearchOutcome> {
        let Self {
            mut events,
            handle,
            _guard,
        } = self;
        while events.recv().await.is_some() {}
        handle
            .await
            .map_err(|err| CommitSearchError::Worker(err.to_string()))?
    }
}

/// State owned by the merge loop.
struct MergeState {
    limit: usize,
    results: Vec<CommitSearchResult>,
    forwarded: usize,
    stats: AggregateStats,
    fatal: Option<CommitSearchError>,
}

/// Spawned shard workers and the repository each one searches.
struct ShardTasks {
    workers: JoinSet<()>,
    repos: HashMap<task::Id, RepoName>,
}

struct FanOut {
    config: Arc<CommitSearchConfig>,
    source: Arc<dyn LogDiffSource>,
    users: Arc<dyn UserDirectory>,
    /// Request scope; a child of `caller_cancel`.
    cancel: CancellationToken,
    caller_cancel: CancellationToken,
    events: mpsc::Sender<SearchEvent>,
}

impl FanOut {
    async fn run(self, request: CommitSearchRequest) -> Result<CommitSearchOutcome> {
        let started = Instant::now();
        let mode = request.query.mode;
        let result = self.execute(request, started).await;
        let status = SearchStatus::of(&result);
        match &result {
            Ok(outcome) => info!(
                "{mode} search finished with status {status} in {}ms: {} results from {} repositories",
                outcome.elapsed.as_millis(),
                outcome.results.len(),
                outcome.stats.searched.len()
            ),
            Err(err) => info!("{mode} search finished with status {status}: {err}"),
        }
        result
    }

    async fn execute(
        &self,
        request: CommitSearchRequest,
        started: Instant,
    ) -> Result<CommitSearchOutcome> {
        let CommitSearchRequest { query, repos } = request;
        let mode = query.mode;

        if let Some((repo, spec)) = pinned_missing_revision(&repos) {
            return Err(CommitSearchError::RevisionNotFound { repo, spec });
        }

        let timeout = self.config.request_timeout(&query)?;
        let limit = self.config.result_limit(&query);

        let mut stats = AggregateStats::default();
        stats.missing.extend(
            repos
                .missing_revisions
                .iter()
                .map(|missing| missing.repo.clone()),
        );

        let (shards, skipped): (Vec<&RepositoryRevisions>, Vec<&RepositoryRevisions>) =
            repos.searchable.iter().partition(|shard| !shard.is_empty());
        for shard in skipped {
            debug!("skipping {}: no revisions to search", shard.repo);
        }

        let max_repos = self.config.max_repos_without_time_bound;
        if !query.has_time_bound() && shards.len() > max_repos {
            return Ok(CommitSearchOutcome {
                results: Vec::new(),
                stats,
                alert: Some(SearchAlert::RepositoryLimitExceeded {
                    mode,
                    limit: max_repos,
                    matched: shards.len(),
                }),
                elapsed: started.elapsed(),
            });
        }

        // Every query construction error surfaces before anything is dispatched.
        let matcher = MessageMatcher::new(&query.pattern)?.map(Arc::new);
        let filters = GrepFilters::resolve(&query, self.users.as_ref())
            .or_cancel(&self.cancel)
            .await
            .map_err(|_| CommitSearchError::Cancelled)??;
        let operations = shards
            .iter()
            .map(|shard| {
                SearchOperation::for_shard(&query, &filters, shard, limit)
                    .map(|operation| (shard.repo.clone(), operation))
            })
            .collect::<Result<Vec<_>>>()?;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let mut workers = JoinSet::new();
        let mut shard_tasks = HashMap::new();
        for (repo, operation) in operations {
            let worker = ShardWorker {
                repo: repo.clone(),
                operation,
                source: Arc::clone(&self.source),
                matcher: matcher.clone(),
                batch_size: self.config.batch_size,
                shard_timeout: self.config.shard_timeout,
                cancel: self.cancel.clone(),
                tx: tx.clone(),
            };
            let task = workers.spawn(worker.run());
            shard_tasks.insert(task.id(), repo);
        }
        drop(tx);

        let deadline = spawn_deadline(self.cancel.clone(), timeout);
        let mut state = MergeState {
            limit,
            results: Vec::new(),
            forwarded: 0,
            stats,
            fatal: None,
        };
        let mut shards = ShardTasks {
            workers,
            repos: shard_tasks,
        };
        self.merge(rx, &mut shards, &mut state, mode).await;

        // All senders are gone, so every worker has returned or panicked.
        while let Some(joined) = shards.workers.join_next().await {
            if let Err(err) = joined {
                self.record_join_error(&mut state, &shards.repos, err, mode);
            }
        }
        self.cancel.cancel();
        let deadline_hit = deadline.await.unwrap_or(false);

        let MergeState {
            mut results,
            mut stats,
            fatal,
            ..
        } = state;
        if let Some(err) = fatal {
            return Err(err);
        }
        if self.caller_cancel.is_cancelled() {
            return Err(CommitSearchError::Cancelled);
        }

        sort_newest_first(&mut results);
        if results.len() > limit {
            results.truncate(limit);
            stats.limit_hit = true;
        }

        let elapsed = started.elapsed();
        // Partial results do not hide the alert when every shard timed out.
        let timed_out = (deadline_hit && results.is_empty()) || stats.all_timed_out();
        let alert = timed_out.then(|| SearchAlert::Timeout {
            used: elapsed,
            suggested: longer(2, elapsed),
        });

        Ok(CommitSearchOutcome {
            results,
            stats,
            alert,
            elapsed,
        })
    }

    /// Receives until every worker has hung up. Batches are forwarded to the
    /// caller until the global cap is reached; after a fatal error they are
    /// dropped. Worker tasks are joined alongside so a panic cancels the
    /// remaining shards right away.
    async fn merge(
        &self,
        mut rx: mpsc::Receiver<WorkerMessage>,
        shards: &mut ShardTasks,
        state: &mut MergeState,
        mode: CommitSearchMode,
    ) {
        let mut joining = true;
        loop {
            let message = tokio::select! {
                message = rx.recv() => message,
                joined = shards.workers.join_next(), if joining => {
                    match joined {
                        Some(Err(err)) => {
                            self.record_join_error(state, &shards.repos, err, mode);
                        }
                        Some(Ok(())) => {}
                        None => joining = false,
                    }
                    continue;
                }
            };
            let Some(message) = message else {
                break;
            };
            match message {
                WorkerMessage::Batch { repo, results } => {
                    if state.fatal.is_some() {
                        continue;
                    }
                    let room = state.limit.saturating_sub(state.forwarded);
                    let forward: Vec<CommitSearchResult> =
                        results.iter().take(room).cloned().collect();
                    state.results.extend(results);
                    if forward.is_empty() {
                        continue;
                    }
                    state.forwarded += forward.len();
                    let event = SearchEvent {
                        results: forward,
                        stats: state.stats.clone(),
                    };
                    if self.events.send(event).await.is_err() {
                        debug!("caller stopped reading; keeping results from {repo}");
                    }
                }
                WorkerMessage::Done {
                    repo,
                    pinned,
                    outcome,
                } => self.record(state, repo, pinned, outcome, mode),
            }
        }
    }

    fn record_join_error(
        &self,
        state: &mut MergeState,
        repos: &HashMap<task::Id, RepoName>,
        err: JoinError,
        mode: CommitSearchMode,
    ) {
        let Some(repo) = repos.get(&err.id()).cloned() else {
            warn!("{mode} search worker failed: {err}");
            if state.fatal.is_none() {
                self.cancel.cancel();
                state.fatal = Some(CommitSearchError::Worker(err.to_string()));
            }
            return;
        };
        if state.fatal.is_some() {
            debug!("ignoring later worker failure in {repo}: {err}");
            return;
        }
        warn!("{mode} search worker for {repo} failed, cancelling remaining shards: {err}");
        self.cancel.cancel();
        state.fatal = Some(CommitSearchError::ShardPanicked {
            repo,
            mode,
            message: err.to_string(),
        });
    }

    fn record(
        &self,
        state: &mut MergeState,
        repo: RepoName,
        pinned: bool,
        outcome: std::result::Result<ShardStatus, SourceError>,
        mode: CommitSearchMode,
    ) {
        let stats = &mut state.stats;
        match classify(outcome, pinned) {
            ShardDisposition::Searched(status) => {
                debug!("{repo}: {} matches forwarded", status.matches);
                if status.timed_out {
                    stats.timed_out.insert(repo.clone());
                }
                if status.limit_hit {
                    stats.limit_hit = true;
                    stats.partial.insert(repo.clone());
                }
                stats.searched.insert(repo);
            }
            ShardDisposition::Cloning => {
                debug!("{repo} is still cloning; skipped");
                stats.cloning.insert(repo);
            }
            ShardDisposition::Missing => {
                debug!("{repo} or its default revision is missing; skipped");
                stats.missing.insert(repo);
            }
            ShardDisposition::TimedOut => {
                debug!("{repo} timed out");
                stats.searched.insert(repo.clone());
                stats.timed_out.insert(repo);
            }
            ShardDisposition::Fatal(source) => {
                if state.fatal.is_some() {
                    debug!("ignoring later failure in {repo}: {source}");
                    return;
                }
                warn!("{mode} search failed in {repo}, cancelling remaining shards: {source}");
                self.cancel.cancel();
                state.fatal = Some(CommitSearchError::Shard { repo, mode, source });
            }
        }
    }
}

/// Cancels `cancel` once `timeout` elapses. Resolves to whether it fired.
fn spawn_deadline(cancel: CancellationToken, timeout: Duration) -> JoinHandle<bool> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep(timeout) => {
                cancel.cancel();
                true
            }
        }
    })
}

fn pinned_missing_revision(repos: &ResolvedRepositories) -> Option<(RepoName, String)> {
    repos.missing_revisions.iter().find_map(|missing| {
        missing
            .revs
            .iter()
            .find(|rev| rev.is_pin())
            .map(|rev| (missing.repo.clone(), rev.text().to_string()))
    })
}

/// Author date descending; repository then commit id break ties.
fn sort_newest_first(results: &mut [CommitSearchResult]) {
    results.sort_by(|a, b| {
        b.commit
            .author_date
            .cmp(&a.commit.author_date)
            .then_with(|| a.repo.cmp(&b.repo))
            .then_with(|| a.commit.id.cmp(&b.commit.id))
    });
}
