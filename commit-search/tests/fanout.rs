use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use pretty_assertions::assert_eq;
use shardscan_commit_search::CommitSearchConfig;
use shardscan_commit_search::CommitSearchError;
use shardscan_commit_search::CommitSearchRequest;
use shardscan_commit_search::CommitSearcher;
use shardscan_commit_search::DirectoryError;
use shardscan_commit_search::GrepField;
use shardscan_commit_search::LogDiffSource;
use shardscan_commit_search::NoUserDirectory;
use shardscan_commit_search::RawMatchStream;
use shardscan_commit_search::SearchOperation;
use shardscan_commit_search::SearchStatus;
use shardscan_commit_search::SourceError;
use shardscan_commit_search::UserDirectory;
use shardscan_protocol::CommitSearchMode;
use shardscan_protocol::CommitSearchQuery;
use shardscan_protocol::FieldFilter;
use shardscan_protocol::PatternInfo;
use shardscan_protocol::RawCommit;
use shardscan_protocol::RawMatchEvent;
use shardscan_protocol::RepoName;
use shardscan_protocol::RepositoryRevisions;
use shardscan_protocol::ResolvedRepositories;
use shardscan_protocol::RevisionSelector;
use shardscan_protocol::SearchAlert;
use shardscan_protocol::Signature;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::Instant;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum Behavior {
    Matches(Vec<RawMatchEvent>),
    /// Yields each match after waiting `delay`.
    Slow(Duration, Vec<RawMatchEvent>),
    Fail(SourceError),
    Hang,
    /// Yields the matches, then never finishes.
    ThenHang(Vec<RawMatchEvent>),
    Panic,
}

#[derive(Default)]
struct FakeSource {
    behaviors: HashMap<RepoName, Behavior>,
    calls: Mutex<Vec<(RepoName, SearchOperation)>>,
}

impl FakeSource {
    fn with(mut self, repo: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(RepoName::from(repo), behavior);
        self
    }

    fn called_repos(&self) -> BTreeSet<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(repo, _)| repo.to_string())
            .collect()
    }
}

#[async_trait]
impl LogDiffSource for FakeSource {
    async fn search(
        &self,
        repo: &RepoName,
        operation: &SearchOperation,
    ) -> Result<RawMatchStream, SourceError> {
        self.calls
            .lock()
            .unwrap()
            .push((repo.clone(), operation.clone()));
        match self.behaviors.get(repo).cloned().unwrap_or(Behavior::Matches(Vec::new())) {
            Behavior::Matches(events) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
            Behavior::Slow(delay, events) => Ok(stream::iter(events)
                .then(move |event| async move {
                    sleep(delay).await;
                    Ok(event)
                })
                .boxed()),
            Behavior::Fail(err) => Err(err),
            Behavior::Hang => Ok(stream::pending().boxed()),
            Behavior::ThenHang(events) => Ok(stream::iter(events.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Behavior::Panic => panic!("source exploded for {repo}"),
        }
    }
}

struct FakeDirectory;

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn verified_emails(&self, username: &str) -> Result<Option<Vec<String>>, DirectoryError> {
        Ok((username == "ada").then(|| vec!["ada@example.com".to_string()]))
    }
}

fn commit(repo: &str, id: &str, minute: i64) -> RawMatchEvent {
    RawMatchEvent {
        commit: RawCommit {
            id: id.to_string(),
            author: Signature {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                date: OffsetDateTime::UNIX_EPOCH + time::Duration::minutes(minute),
            },
            committer: None,
            message: format!("update {repo} ({id})"),
            parents: Vec::new(),
        },
        diff: None,
        ref_names: Vec::new(),
        source_refs: Vec::new(),
        complete: true,
    }
}

fn commits(repo: &str, count: usize) -> Vec<RawMatchEvent> {
    (0..count)
        .map(|idx| commit(repo, &format!("{repo}-{idx}"), idx as i64))
        .collect()
}

fn default_branch(repo: &str) -> RepositoryRevisions {
    RepositoryRevisions::new(repo, vec![RevisionSelector::default_branch()])
}

fn searcher(source: &Arc<FakeSource>) -> CommitSearcher {
    let source: Arc<dyn LogDiffSource> = source.clone();
    CommitSearcher::new(CommitSearchConfig::default(), source, Arc::new(NoUserDirectory)).unwrap()
}

fn request(query: CommitSearchQuery, shards: Vec<RepositoryRevisions>) -> CommitSearchRequest {
    CommitSearchRequest {
        query,
        repos: ResolvedRepositories {
            searchable: shards,
            missing_revisions: Vec::new(),
        },
    }
}

fn repo_set(names: &[&str]) -> BTreeSet<RepoName> {
    names.iter().map(|name| RepoName::from(*name)).collect()
}

#[tokio::test]
async fn tolerates_per_shard_conditions() {
    let source = Arc::new(
        FakeSource::default()
            .with("normal-a", Behavior::Matches(commits("normal-a", 2)))
            .with("normal-b", Behavior::Matches(commits("normal-b", 1)))
            .with("empty", Behavior::Matches(Vec::new()))
            .with(
                "cloning",
                Behavior::Fail(SourceError::CloneInProgress {
                    repo: RepoName::from("cloning"),
                    progress: Some("12% done".to_string()),
                }),
            )
            .with(
                "missing",
                Behavior::Fail(SourceError::RepoNotFound {
                    repo: RepoName::from("missing"),
                }),
            )
            .with(
                "missing-alt",
                Behavior::Fail(SourceError::RevisionNotFound {
                    repo: RepoName::from("missing-alt"),
                    spec: "HEAD".to_string(),
                }),
            )
            .with("timed-out", Behavior::Fail(SourceError::Timeout))
            .with("no-revisions", Behavior::Panic),
    );
    let shards = vec![
        default_branch("normal-a"),
        default_branch("normal-b"),
        default_branch("empty"),
        default_branch("cloning"),
        default_branch("missing"),
        default_branch("missing-alt"),
        default_branch("timed-out"),
        RepositoryRevisions::new("no-revisions", Vec::new()),
    ];

    let outcome = searcher(&source)
        .search(
            request(CommitSearchQuery::default(), shards),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let result_repos: BTreeSet<String> = outcome
        .results
        .iter()
        .map(|result| result.repo.to_string())
        .collect();
    assert_eq!(
        result_repos,
        BTreeSet::from(["normal-a".to_string(), "normal-b".to_string()])
    );
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.stats.cloning, repo_set(&["cloning"]));
    assert_eq!(outcome.stats.missing, repo_set(&["missing", "missing-alt"]));
    assert_eq!(outcome.stats.timed_out, repo_set(&["timed-out"]));
    assert!(!outcome.stats.limit_hit);
    assert!(!source.called_repos().contains("no-revisions"));
    assert_eq!(outcome.status(), SearchStatus::PartialTimeout);
    assert_eq!(outcome.alert, None);
}

#[tokio::test]
async fn pinned_missing_revision_fails_before_dispatch() {
    let source = Arc::new(FakeSource::default().with("healthy", Behavior::Matches(commits("healthy", 3))));
    let request = CommitSearchRequest {
        query: CommitSearchQuery::default(),
        repos: ResolvedRepositories {
            searchable: vec![default_branch("healthy")],
            missing_revisions: vec![RepositoryRevisions::new(
                "pinned",
                vec![RevisionSelector::Exact("v9.9.9".to_string())],
            )],
        },
    };

    let err = searcher(&source)
        .search(request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CommitSearchError::RevisionNotFound { ref repo, ref spec }
            if repo.as_str() == "pinned" && spec == "v9.9.9"
    ));
    assert!(source.called_repos().is_empty());
}

#[tokio::test]
async fn missing_default_branch_from_resolver_is_tolerated() {
    let source = Arc::new(FakeSource::default().with("healthy", Behavior::Matches(commits("healthy", 1))));
    let request = CommitSearchRequest {
        query: CommitSearchQuery::default(),
        repos: ResolvedRepositories {
            searchable: vec![default_branch("healthy")],
            missing_revisions: vec![default_branch("empty-repo")],
        },
    };

    let outcome = searcher(&source)
        .search(request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.stats.missing, repo_set(&["empty-repo"]));
}

#[tokio::test]
async fn pinned_revision_not_found_on_shard_is_fatal() {
    let source = Arc::new(FakeSource::default().with(
        "pinned",
        Behavior::Fail(SourceError::RevisionNotFound {
            repo: RepoName::from("pinned"),
            spec: "release-1".to_string(),
        }),
    ));
    let shard = RepositoryRevisions::new(
        "pinned",
        vec![RevisionSelector::Exact("release-1".to_string())],
    );

    let err = searcher(&source)
        .search(
            request(CommitSearchQuery::default(), vec![shard]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommitSearchError::Shard {
            source: SourceError::RevisionNotFound { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn filter_combination_fails_before_dispatch() {
    let source = Arc::new(FakeSource::default());
    let query = CommitSearchQuery {
        message: FieldFilter {
            include: vec!["fix".to_string()],
            exclude: vec!["revert".to_string()],
        },
        ..Default::default()
    };

    let err = searcher(&source)
        .search(
            request(query, vec![default_branch("a"), default_branch("b")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommitSearchError::UnsupportedFilterCombination {
            field: GrepField::Message
        }
    ));
    assert!(source.called_repos().is_empty());
}

#[tokio::test]
async fn flag_like_revision_fails_before_dispatch() {
    let source = Arc::new(FakeSource::default());
    let shards = vec![
        default_branch("fine"),
        RepositoryRevisions::new(
            "hostile",
            vec![RevisionSelector::Exact("--upload-pack=evil".to_string())],
        ),
    ];

    let err = searcher(&source)
        .search(
            request(CommitSearchQuery::default(), shards),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CommitSearchError::InvalidRevspec { .. }));
    assert!(source.called_repos().is_empty());
}

#[tokio::test(start_paused = true)]
async fn results_are_sorted_newest_first_across_shards() {
    // The shard holding the newest commits finishes last.
    let source = Arc::new(
        FakeSource::default()
            .with(
                "slow",
                Behavior::Slow(
                    Duration::from_millis(300),
                    vec![commit("slow", "s1", 50), commit("slow", "s2", 10)],
                ),
            )
            .with(
                "fast",
                Behavior::Matches(vec![
                    commit("fast", "f1", 30),
                    commit("fast", "f2", 50),
                    commit("fast", "f3", 1),
                ]),
            ),
    );

    let outcome = searcher(&source)
        .search(
            request(
                CommitSearchQuery::default(),
                vec![default_branch("slow"), default_branch("fast")],
            ),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = outcome
        .results
        .iter()
        .map(|result| result.commit.id.as_str())
        .collect();
    assert_eq!(ids, vec!["f2", "s1", "f1", "s2", "f3"]);
}

#[tokio::test]
async fn global_cap_truncates_and_sets_limit_hit() {
    let source = Arc::new(
        FakeSource::default()
            .with("a", Behavior::Matches(commits("a", 3)))
            .with("b", Behavior::Matches(commits("b", 3))),
    );
    let query = CommitSearchQuery {
        count: Some(4),
        ..Default::default()
    };

    let mut stream = searcher(&source).stream(
        request(query, vec![default_branch("a"), default_branch("b")]),
        &CancellationToken::new(),
    );
    let mut streamed = 0;
    while let Some(event) = stream.next().await {
        streamed += event.results.len();
    }
    let outcome = stream.finish().await.unwrap();

    assert!(streamed <= 4);
    assert_eq!(outcome.results.len(), 4);
    assert!(outcome.stats.limit_hit);
    assert!(outcome.stats.partial.is_empty());
}

#[tokio::test]
async fn shard_cap_requests_one_extra_match() {
    let source = Arc::new(FakeSource::default().with("busy", Behavior::Matches(commits("busy", 10))));
    let query = CommitSearchQuery {
        count: Some(3),
        ..Default::default()
    };

    let outcome = searcher(&source)
        .search(
            request(query, vec![default_branch("busy")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.stats.limit_hit);
    assert_eq!(outcome.stats.partial, repo_set(&["busy"]));
    let calls = source.calls.lock().unwrap();
    assert_eq!(calls[0].1.limit, 4);
}

#[tokio::test(start_paused = true)]
async fn fatal_shard_error_cancels_siblings() {
    let source = Arc::new(
        FakeSource::default()
            .with("hanging", Behavior::Hang)
            .with(
                "broken",
                Behavior::Fail(SourceError::Other("fatal: bad object".to_string())),
            ),
    );
    let started = Instant::now();

    let err = searcher(&source)
        .search(
            request(
                CommitSearchQuery::default(),
                vec![default_branch("hanging"), default_branch("broken")],
            ),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(20));
    match err {
        CommitSearchError::Shard { repo, mode, source } => {
            assert_eq!(repo.as_str(), "broken");
            assert_eq!(mode, CommitSearchMode::Diff);
            assert_eq!(source, SourceError::Other("fatal: bad object".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn caller_cancellation_drains_and_reports_cancelled() {
    let source = Arc::new(
        FakeSource::default()
            .with("a", Behavior::Hang)
            .with("b", Behavior::Hang),
    );
    let cancel = CancellationToken::new();
    let stream = searcher(&source).stream(
        request(
            CommitSearchQuery::default(),
            vec![default_branch("a"), default_branch("b")],
        ),
        &cancel,
    );

    cancel.cancel();
    let err = stream.finish().await.unwrap_err();
    assert!(matches!(err, CommitSearchError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn request_deadline_times_out_with_alert() {
    let source = Arc::new(
        FakeSource::default()
            .with("a", Behavior::Hang)
            .with("b", Behavior::Hang),
    );
    let query = CommitSearchQuery {
        timeout: Some("1s".to_string()),
        ..Default::default()
    };

    let outcome = searcher(&source)
        .search(
            request(query, vec![default_branch("a"), default_branch("b")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.stats.timed_out, repo_set(&["a", "b"]));
    assert_eq!(outcome.status(), SearchStatus::Timeout);
    match outcome.alert {
        Some(SearchAlert::Timeout { used, suggested }) => {
            assert!(used >= Duration::from_secs(1));
            assert_eq!(suggested, Duration::from_secs(2));
        }
        other => panic!("expected a timeout alert, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_keeps_partial_results() {
    let source = Arc::new(
        FakeSource::default()
            .with("quick", Behavior::Matches(commits("quick", 2)))
            .with("stuck", Behavior::Hang),
    );
    let query = CommitSearchQuery {
        timeout: Some("500ms".to_string()),
        ..Default::default()
    };

    let outcome = searcher(&source)
        .search(
            request(query, vec![default_branch("quick"), default_branch("stuck")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.stats.timed_out, repo_set(&["stuck"]));
    assert_eq!(outcome.alert, None);
    assert_eq!(outcome.status(), SearchStatus::PartialTimeout);
}

#[tokio::test]
async fn unbounded_search_over_too_many_repositories_is_refused() {
    let source = Arc::new(FakeSource::default());
    let shards: Vec<RepositoryRevisions> = (0..51)
        .map(|idx| default_branch(&format!("repo-{idx}")))
        .collect();

    let outcome = searcher(&source)
        .search(
            request(CommitSearchQuery::default(), shards.clone()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(source.called_repos().is_empty());
    assert_eq!(
        outcome.alert,
        Some(SearchAlert::RepositoryLimitExceeded {
            mode: CommitSearchMode::Diff,
            limit: 50,
            matched: 51,
        })
    );

    let bounded = CommitSearchQuery {
        after: Some("1 month ago".to_string()),
        ..Default::default()
    };
    let outcome = searcher(&source)
        .search(request(bounded, shards), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.alert, None);
    assert_eq!(source.called_repos().len(), 51);
}

#[tokio::test]
async fn panicking_worker_fails_the_request() {
    let source = Arc::new(
        FakeSource::default()
            .with("fine", Behavior::Matches(commits("fine", 1)))
            .with("explodes", Behavior::Panic),
    );

    let err = searcher(&source)
        .search(
            request(
                CommitSearchQuery::default(),
                vec![default_branch("fine"), default_branch("explodes")],
            ),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommitSearchError::ShardPanicked { ref repo, mode: CommitSearchMode::Diff, .. }
            if repo.as_str() == "explodes"
    ));
}

#[tokio::test(start_paused = true)]
async fn panicking_worker_cancels_hanging_siblings() {
    let source = Arc::new(
        FakeSource::default()
            .with("hanging", Behavior::Hang)
            .with("explodes", Behavior::Panic),
    );
    let started = Instant::now();

    let err = searcher(&source)
        .search(
            request(
                CommitSearchQuery::default(),
                vec![default_branch("hanging"), default_branch("explodes")],
            ),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(20));
    match err {
        CommitSearchError::ShardPanicked { repo, mode, message } => {
            assert_eq!(repo, RepoName::from("explodes"));
            assert_eq!(mode, CommitSearchMode::Diff);
            assert!(message.contains("source exploded for explodes"));
        }
        other => panic!("expected a shard panic, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn every_shard_timing_out_alerts_even_with_partial_results() {
    let source = Arc::new(
        FakeSource::default()
            .with("a", Behavior::ThenHang(commits("a", 1)))
            .with("b", Behavior::ThenHang(commits("b", 2))),
    );
    let query = CommitSearchQuery {
        timeout: Some("1s".to_string()),
        ..Default::default()
    };

    // Flush every match as soon as it is read.
    let config = CommitSearchConfig {
        batch_size: 1,
        ..Default::default()
    };
    let source_dyn: Arc<dyn LogDiffSource> = source.clone();
    let searcher = CommitSearcher::new(config, source_dyn, Arc::new(NoUserDirectory)).unwrap();

    let outcome = searcher
        .search(
            request(query, vec![default_branch("a"), default_branch("b")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.stats.timed_out, repo_set(&["a", "b"]));
    assert!(matches!(outcome.alert, Some(SearchAlert::Timeout { .. })));
    assert_eq!(outcome.status(), SearchStatus::Timeout);
}

#[tokio::test]
async fn streamed_events_carry_interim_stats() {
    let source = Arc::new(
        FakeSource::default()
            .with("a", Behavior::Matches(commits("a", 2)))
            .with(
                "cloning",
                Behavior::Fail(SourceError::CloneInProgress {
                    repo: RepoName::from("cloning"),
                    progress: None,
                }),
            ),
    );

    let mut stream = searcher(&source).stream(
        request(
            CommitSearchQuery::default(),
            vec![default_branch("a"), default_branch("cloning")],
        ),
        &CancellationToken::new(),
    );
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    let outcome = stream.finish().await.unwrap();

    let streamed: usize = events.iter().map(|event| event.results.len()).sum();
    assert_eq!(streamed, 2);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.stats.cloning, repo_set(&["cloning"]));
    assert_eq!(outcome.status(), SearchStatus::Success);
}

#[tokio::test]
async fn log_mode_sends_expanded_filters_to_the_source() {
    let source = Arc::new(FakeSource::default().with("a", Behavior::Matches(commits("a", 1))));
    let dyn_source: Arc<dyn LogDiffSource> = source.clone();
    let searcher = CommitSearcher::new(
        CommitSearchConfig::default(),
        dyn_source,
        Arc::new(FakeDirectory),
    )
    .unwrap();
    let query = CommitSearchQuery {
        pattern: PatternInfo::literal("update"),
        mode: CommitSearchMode::Log,
        author: FieldFilter::including(["@ada"]),
        ..Default::default()
    };

    let outcome = searcher
        .search(request(query, vec![default_branch("a")]), &CancellationToken::new())
        .await
        .unwrap();

    let calls = source.calls.lock().unwrap();
    let operation = &calls[0].1;
    assert_eq!(operation.diff_pattern, None);
    assert_eq!(operation.filters.message.values, vec!["update".to_string()]);
    assert_eq!(
        operation.filters.author.values,
        vec![r"ada@example\.com".to_string()]
    );
    assert!(operation.log_args().contains(&"--all-match".to_string()));

    let preview = outcome.results[0].message_preview.as_ref().unwrap();
    assert_eq!(preview.highlights.len(), 1);
    assert_eq!(preview.highlights[0].character, 0);
}
