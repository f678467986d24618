use crate::repo::RepoName;
use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Struct,
    Enum,
    Interface,
    Class,
    Constant,
    Variable,
    Module,
    Other,
}

/// Per-variant payload of a suggestion.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuggestionKind {
    Repository {
        name: RepoName,
    },
    /// A file containing a full-text match.
    Path {
        repo: RepoName,
        rev: String,
        path: String,
    },
    /// A file whose path matched.
    Blob {
        repo: RepoName,
        rev: String,
        path: String,
    },
    /// A directory whose path matched.
    Tree {
        repo: RepoName,
        rev: String,
        path: String,
    },
    Symbol {
        name: String,
        kind: SymbolKind,
        container: Option<String>,
        url: String,
    },
    Language {
        name: String,
    },
    SavedContext {
        spec: String,
        description: Option<String>,
    },
}

/// Identity used to collapse duplicates produced by different producers.
/// Path, blob and tree suggestions for the same file share a key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SuggestionKey {
    Repository(RepoName),
    File {
        repo: RepoName,
        rev: String,
        path: String,
    },
    Symbol {
        name: String,
        kind: SymbolKind,
        container: Option<String>,
        url: String,
    },
    Language(String),
    SavedContext(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuggestionItem {
    #[serde(flatten)]
    pub kind: SuggestionKind,
    pub score: i32,
    pub label: String,
}

impl SuggestionItem {
    pub fn new(kind: SuggestionKind, score: i32) -> Self {
        let label = default_label(&kind);
        Self { kind, score, label }
    }

    /// Tiebreaker used when scores are equal: shorter labels rank first.
    pub fn length(&self) -> usize {
        self.label.chars().count()
    }

    pub fn dedup_key(&self) -> SuggestionKey {
        match &self.kind {
            SuggestionKind::Repository { name } => SuggestionKey::Repository(name.clone()),
            SuggestionKind::Path { repo, rev, path }
            | SuggestionKind::Blob { repo, rev, path }
            | SuggestionKind::Tree { repo, rev, path } => SuggestionKey::File {
                repo: repo.clone(),
                rev: rev.clone(),
                path: path.clone(),
            },
            SuggestionKind::Symbol {
                name,
                kind,
                container,
                url,
            } => SuggestionKey::Symbol {
                name: name.clone(),
                kind: *kind,
                container: container.clone(),
                url: url.clone(),
            },
            SuggestionKind::Language { name } => SuggestionKey::Language(name.to_lowercase()),
            SuggestionKind::SavedContext { spec, .. } => SuggestionKey::SavedContext(spec.clone()),
        }
    }
}

fn default_label(kind: &SuggestionKind) -> String {
    match kind {
        SuggestionKind::Repository { name } => name.to_string(),
        SuggestionKind::Path { path, .. }
        | SuggestionKind::Blob { path, .. }
        | SuggestionKind::Tree { path, .. } => path.clone(),
        SuggestionKind::Symbol { name, .. } => name.clone(),
        SuggestionKind::Language { name } => name.clone(),
        SuggestionKind::SavedContext { spec, .. } => spec.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_variants_share_a_key() {
        let blob = SuggestionItem::new(
            SuggestionKind::Blob {
                repo: "acme/api".into(),
                rev: "main".to_string(),
                path: "src/lib.rs".to_string(),
            },
            10,
        );
        let text_hit = SuggestionItem::new(
            SuggestionKind::Path {
                repo: "acme/api".into(),
                rev: "main".to_string(),
                path: "src/lib.rs".to_string(),
            },
            3,
        );
        assert_eq!(blob.dedup_key(), text_hit.dedup_key());
    }

    #[test]
    fn language_key_ignores_case() {
        let upper = SuggestionItem::new(
            SuggestionKind::Language {
                name: "Rust".to_string(),
            },
            1,
        );
        let lower = SuggestionItem::new(
            SuggestionKind::Language {
                name: "rust".to_string(),
            },
            1,
        );
        assert_eq!(upper.dedup_key(), lower.dedup_key());
        assert_eq!(upper.length(), 4);
    }

    #[test]
    fn item_serializes_flat() {
        let item = SuggestionItem::new(
            SuggestionKind::Repository {
                name: "acme/api".into(),
            },
            7,
        );
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "repository");
        assert_eq!(json["name"], "acme/api");
        assert_eq!(json["label"], "acme/api");
    }
}
