//! Translation of a commit search query into per-shard retrieval requests.

use crate::error::CommitSearchError;
use crate::error::GrepField;
use crate::error::Result;
use crate::source::UserDirectory;
use serde::Serialize;
use shardscan_protocol::CommitSearchMode;
use shardscan_protocol::CommitSearchQuery;
use shardscan_protocol::FieldFilter;
use shardscan_protocol::PatternInfo;
use shardscan_protocol::RepositoryRevisions;
use shardscan_protocol::RevisionSelector;

const USERNAME_SIGIL: char = '@';

/// Values for one grep-like field. Within a field values are alternatives;
/// `negated` inverts the whole field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GrepFilter {
    pub values: Vec<String>,
    pub negated: bool,
}

impl GrepFilter {
    fn from_values(field: GrepField, include: Vec<String>, exclude: Vec<String>) -> Result<Self> {
        match (include.is_empty(), exclude.is_empty()) {
            (false, false) => Err(CommitSearchError::UnsupportedFilterCombination { field }),
            (true, false) => Ok(Self {
                values: exclude,
                negated: true,
            }),
            _ => Ok(Self {
                values: include,
                negated: false,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Message, author and committer filters resolved once per request and
/// shared by every shard's operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GrepFilters {
    pub message: GrepFilter,
    pub author: GrepFilter,
    pub committer: GrepFilter,
}

impl GrepFilters {
    /// Collects the grep-like filters of `query`.
    ///
    /// In log mode a non-empty pattern must match the commit message, so it
    /// joins the positive message values. `@username` values of the author
    /// and committer fields become that user's verified email addresses;
    /// unknown users are kept verbatim.
    pub async fn resolve(query: &CommitSearchQuery, users: &dyn UserDirectory) -> Result<Self> {
        let mut message_include = query.message.include.clone();
        if query.mode == CommitSearchMode::Log && !query.pattern.is_empty() {
            message_include.push(pattern_source(&query.pattern));
        }

        let message = GrepFilter::from_values(
            GrepField::Message,
            message_include,
            query.message.exclude.clone(),
        )?;
        let author = resolve_identity_field(GrepField::Author, &query.author, users).await?;
        let committer =
            resolve_identity_field(GrepField::Committer, &query.committer, users).await?;

        Ok(Self {
            message,
            author,
            committer,
        })
    }

    /// Whether every non-empty field must match, rather than any of them.
    pub fn all_match(&self) -> bool {
        !(self.message.is_empty() && self.author.is_empty() && self.committer.is_empty())
    }
}

async fn resolve_identity_field(
    field: GrepField,
    filter: &FieldFilter,
    users: &dyn UserDirectory,
) -> Result<GrepFilter> {
    // Reject the combination before spending a directory round trip on it.
    if !filter.include.is_empty() && !filter.exclude.is_empty() {
        return Err(CommitSearchError::UnsupportedFilterCombination { field });
    }
    let include = expand_usernames(&filter.include, users).await?;
    let exclude = expand_usernames(&filter.exclude, users).await?;
    GrepFilter::from_values(field, include, exclude)
}

async fn expand_usernames(values: &[String], users: &dyn UserDirectory) -> Result<Vec<String>> {
    let mut expanded = Vec::with_capacity(values.len());
    for value in values {
        let Some(username) = value.strip_prefix(USERNAME_SIGIL) else {
            expanded.push(value.clone());
            continue;
        };
        let emails = users.verified_emails(username).await.map_err(|source| {
            CommitSearchError::UserLookup {
                username: username.to_string(),
                source,
            }
        })?;
        match emails {
            Some(emails) => expanded.extend(emails.iter().map(|email| regex::escape(email))),
            None => expanded.push(value.clone()),
        }
    }
    Ok(expanded)
}

/// Regex source for `pattern`; literal patterns are escaped.
pub(crate) fn pattern_source(pattern: &PatternInfo) -> String {
    if pattern.is_regex {
        pattern.text.clone()
    } else {
        regex::escape(&pattern.text)
    }
}

/// Immutable request for one shard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchOperation {
    pub revisions: Vec<RevisionSelector>,
    pub mode: CommitSearchMode,
    /// Regex the changed lines must match; only set in diff mode.
    pub diff_pattern: Option<String>,
    pub case_sensitive: bool,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub filters: GrepFilters,
    pub before: Option<String>,
    pub after: Option<String>,
    /// One more than the result cap, so a full page can be told apart from a
    /// truncated one.
    pub limit: usize,
}

impl SearchOperation {
    pub fn for_shard(
        query: &CommitSearchQuery,
        filters: &GrepFilters,
        shard: &RepositoryRevisions,
        result_limit: usize,
    ) -> Result<Self> {
        if let Some(flag_like) = shard
            .revs
            .iter()
            .map(RevisionSelector::text)
            .find(|text| text.starts_with('-'))
        {
            return Err(CommitSearchError::InvalidRevspec {
                spec: flag_like.to_string(),
            });
        }

        let diff_pattern = match query.mode {
            CommitSearchMode::Diff if !query.pattern.is_empty() => {
                Some(pattern_source(&query.pattern))
            }
            _ => None,
        };

        Ok(Self {
            revisions: shard.revs.clone(),
            mode: query.mode,
            diff_pattern,
            case_sensitive: query.pattern.case_sensitive,
            include_paths: query.include_paths.clone(),
            exclude_paths: query.exclude_paths.clone(),
            filters: filters.clone(),
            before: query.before.clone(),
            after: query.after.clone(),
            limit: result_limit.saturating_add(1),
        })
    }

    pub fn pins_exact_revision(&self) -> bool {
        self.revisions.iter().any(RevisionSelector::is_pin)
    }

    /// Renders the operation as `git log` arguments.
    ///
    /// Negated author and committer filters have no `git log` flag; sources
    /// that shell out must apply them to the streamed commits themselves.
    pub fn log_args(&self) -> Vec<String> {
        let mut args = vec!["log".to_string(), format!("--max-count={}", self.limit)];

        if !self.case_sensitive {
            args.push("--regexp-ignore-case".to_string());
        }
        args.push("--extended-regexp".to_string());

        let filters = &self.filters;
        if filters.all_match() {
            args.push("--all-match".to_string());
        }
        for value in &filters.message.values {
            args.push(format!("--grep={value}"));
        }
        if filters.message.negated {
            args.push("--invert-grep".to_string());
        }
        if !filters.author.negated {
            for value in &filters.author.values {
                args.push(format!("--author={value}"));
            }
        }
        if !filters.committer.negated {
            for value in &filters.committer.values {
                args.push(format!("--committer={value}"));
            }
        }

        if let Some(after) = &self.after {
            args.push(format!("--since={after}"));
        }
        if let Some(before) = &self.before {
            args.push(format!("--until={before}"));
        }
        if let Some(pattern) = &self.diff_pattern {
            args.push(format!("-G{pattern}"));
        }

        // `--exclude` only applies to globs that follow it.
        for rev in &self.revisions {
            if let RevisionSelector::ExcludeRefGlob(glob) = rev {
                args.push(format!("--exclude={glob}"));
            }
        }
        for rev in &self.revisions {
            if let RevisionSelector::RefGlob(glob) = rev {
                args.push(format!("--glob={glob}"));
            }
        }
        for rev in &self.revisions {
            if let RevisionSelector::Exact(spec) = rev {
                args.push(spec.clone());
            }
        }

        args.push("--".to_string());
        args.extend(
            self.include_paths
                .iter()
                .map(|path| format!(":(glob){path}")),
        );
        args.extend(
            self.exclude_paths
                .iter()
                .map(|path| format!(":(exclude,glob){path}")),
        );
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DirectoryError;
    use crate::source::NoUserDirectory;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct FakeDirectory;

    #[async_trait]
    impl UserDirectory for FakeDirectory {
        async fn verified_emails(
            &self,
            username: &str,
        ) -> std::result::Result<Option<Vec<String>>, DirectoryError> {
            match username {
                "alice" => Ok(Some(vec![
                    "alice@example.com".to_string(),
                    "a+work@corp.example".to_string(),
                ])),
                "broken" => Err(DirectoryError::Unavailable("connection reset".to_string())),
                _ => Ok(None),
            }
        }
    }

    fn shard(revs: Vec<RevisionSelector>) -> RepositoryRevisions {
        RepositoryRevisions::new("acme/api", revs)
    }

    #[tokio::test]
    async fn message_include_and_exclude_is_rejected() {
        let query = CommitSearchQuery {
            message: FieldFilter {
                include: vec!["fix".to_string()],
                exclude: vec!["wip".to_string()],
            },
            ..Default::default()
        };
        let err = GrepFilters::resolve(&query, &NoUserDirectory)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommitSearchError::UnsupportedFilterCombination {
                field: GrepField::Message
            }
        ));
    }

    #[tokio::test]
    async fn author_include_and_exclude_is_rejected() {
        let query = CommitSearchQuery {
            author: FieldFilter {
                include: vec!["@alice".to_string()],
                exclude: vec!["bot".to_string()],
            },
            ..Default::default()
        };
        let err = GrepFilters::resolve(&query, &FakeDirectory)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommitSearchError::UnsupportedFilterCombination {
                field: GrepField::Author
            }
        ));
    }

    #[tokio::test]
    async fn log_mode_pattern_conflicts_with_negated_message() {
        let query = CommitSearchQuery {
            pattern: PatternInfo::literal("fix"),
            mode: CommitSearchMode::Log,
            message: FieldFilter::excluding(["revert"]),
            ..Default::default()
        };
        let err = GrepFilters::resolve(&query, &NoUserDirectory)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommitSearchError::UnsupportedFilterCombination {
                field: GrepField::Message
            }
        ));
    }

    #[tokio::test]
    async fn log_mode_pattern_joins_message_values() {
        let query = CommitSearchQuery {
            pattern: PatternInfo::literal("a.b"),
            mode: CommitSearchMode::Log,
            message: FieldFilter::including(["fix"]),
            ..Default::default()
        };
        let filters = GrepFilters::resolve(&query, &NoUserDirectory).await.unwrap();
        assert_eq!(
            filters.message,
            GrepFilter {
                values: vec!["fix".to_string(), r"a\.b".to_string()],
                negated: false,
            }
        );
        assert!(filters.all_match());
    }

    #[tokio::test]
    async fn usernames_expand_to_escaped_emails() {
        let query = CommitSearchQuery {
            author: FieldFilter::including(["@alice", "@nobody", "carol"]),
            committer: FieldFilter::excluding(["@alice"]),
            ..Default::default()
        };
        let filters = GrepFilters::resolve(&query, &FakeDirectory).await.unwrap();
        assert_eq!(
            filters.author.values,
            vec![
                r"alice@example\.com".to_string(),
                r"a\+work@corp\.example".to_string(),
                "@nobody".to_string(),
                "carol".to_string(),
            ]
        );
        assert!(!filters.author.negated);
        assert!(filters.committer.negated);
        assert_eq!(filters.committer.values.len(), 2);
    }

    #[tokio::test]
    async fn directory_failure_is_fatal() {
        let query = CommitSearchQuery {
            author: FieldFilter::including(["@broken"]),
            ..Default::default()
        };
        let err = GrepFilters::resolve(&query, &FakeDirectory)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommitSearchError::UserLookup { ref username, .. } if username == "broken"
        ));
    }

    #[test]
    fn flag_like_revision_is_rejected() {
        let query = CommitSearchQuery::default();
        let err = SearchOperation::for_shard(
            &query,
            &GrepFilters::default(),
            &shard(vec![
                RevisionSelector::Exact("main".to_string()),
                RevisionSelector::Exact("--output=/tmp/x".to_string()),
            ]),
            10,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"invalid git revision spec "--output=/tmp/x" (begins with '-')"#
        );
    }

    #[test]
    fn operation_requests_one_past_the_cap() {
        let op = SearchOperation::for_shard(
            &CommitSearchQuery::default(),
            &GrepFilters::default(),
            &shard(vec![RevisionSelector::Exact("HEAD".to_string())]),
            30,
        )
        .unwrap();
        assert_eq!(op.limit, 31);
        assert_eq!(op.diff_pattern, None);
        assert!(!op.filters.all_match());
    }

    #[tokio::test]
    async fn renders_log_arguments() {
        let query = CommitSearchQuery {
            pattern: PatternInfo::regex("fn \\w+"),
            include_paths: vec!["src/**".to_string()],
            exclude_paths: vec!["vendor/**".to_string()],
            message: FieldFilter::excluding(["wip"]),
            author: FieldFilter::including(["carol"]),
            after: Some("2 weeks ago".to_string()),
            ..Default::default()
        };
        let filters = GrepFilters::resolve(&query, &NoUserDirectory).await.unwrap();
        let op = SearchOperation::for_shard(
            &query,
            &filters,
            &shard(vec![
                RevisionSelector::Exact("v1".to_string()),
                RevisionSelector::RefGlob("refs/heads/*".to_string()),
                RevisionSelector::ExcludeRefGlob("refs/heads/tmp-*".to_string()),
            ]),
            5,
        )
        .unwrap();

        assert_eq!(
            op.log_args(),
            vec![
                "log",
                "--max-count=6",
                "--regexp-ignore-case",
                "--extended-regexp",
                "--all-match",
                "--grep=wip",
                "--invert-grep",
                "--author=carol",
                "--since=2 weeks ago",
                "-Gfn \\w+",
                "--exclude=refs/heads/tmp-*",
                "--glob=refs/heads/*",
                "v1",
                "--",
                ":(glob)src/**",
                ":(exclude,glob)vendor/**",
            ]
        );
    }
}
