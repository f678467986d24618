use crate::highlight::MessageMatcher;
use crate::highlight::clean_diff;
use crate::highlight::highlight_message;
use shardscan_protocol::CommitRef;
use shardscan_protocol::CommitSearchMode;
use shardscan_protocol::CommitSearchResult;
use shardscan_protocol::RawMatchEvent;
use shardscan_protocol::RepoName;
use shardscan_protocol::ResolvedRef;

/// Converts one streamed match into a displayable result.
///
/// Diff searches preview the cleaned diff; log searches, and diff matches
/// that arrived without diff text, preview the message.
pub(crate) fn to_result(
    repo: &RepoName,
    event: RawMatchEvent,
    mode: CommitSearchMode,
    matcher: Option<&MessageMatcher>,
) -> CommitSearchResult {
    let RawMatchEvent {
        commit,
        diff,
        ref_names,
        source_refs,
        complete: _,
    } = event;

    let commit_ref = CommitRef {
        url: commit_url(repo, &commit.id),
        subject: commit.subject().to_string(),
        id: commit.id.clone(),
        author_name: commit.author.name.clone(),
        author_email: commit.author.email.clone(),
        author_date: commit.author.date,
    };

    let (message_preview, diff_preview) = match (mode, diff) {
        (CommitSearchMode::Diff, Some(diff)) => {
            (None, Some(clean_diff(&diff.text, &diff.highlights)))
        }
        (CommitSearchMode::Diff, None) => (Some(highlight_message(&commit.message, None)), None),
        (CommitSearchMode::Log, _) => (Some(highlight_message(&commit.message, matcher)), None),
    };

    CommitSearchResult {
        repo: repo.clone(),
        label: label(repo, &commit_ref),
        detail: detail(&commit_ref),
        commit: commit_ref,
        refs: resolve_refs(&ref_names),
        source_refs: resolve_refs(&source_refs),
        message_preview,
        diff_preview,
    }
}

fn resolve_refs(names: &[String]) -> Vec<ResolvedRef> {
    names
        .iter()
        .filter_map(|name| ResolvedRef::from_decoration(name))
        .collect()
}

fn commit_url(repo: &RepoName, id: &str) -> String {
    format!("/{repo}/-/commit/{id}")
}

fn label(repo: &RepoName, commit: &CommitRef) -> String {
    format!(
        "{repo} › {author}: \"{subject}\"",
        author = commit.author_name,
        subject = commit.subject
    )
}

fn detail(commit: &CommitRef) -> String {
    format!(
        "{id} · {date}",
        id = commit.abbreviated_id(),
        date = commit.author_date.date()
    )
}
