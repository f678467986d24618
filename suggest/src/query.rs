use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// The parsed search query that suggestions are computed for.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionQuery {
    /// A `field:value` filter, e.g. `repo:acme` or `-file:test`.
    Parameter {
        field: String,
        value: String,
        #[serde(default)]
        negated: bool,
    },
    Pattern {
        value: String,
        #[serde(default)]
        is_regex: bool,
    },
    And(Vec<SuggestionQuery>),
    Or(Vec<SuggestionQuery>),
}

impl SuggestionQuery {
    pub fn parameter(field: impl Into<String>, value: impl Into<String>) -> Self {
        SuggestionQuery::Parameter {
            field: field.into(),
            value: value.into(),
            negated: false,
        }
    }

    pub fn pattern(value: impl Into<String>) -> Self {
        SuggestionQuery::Pattern {
            value: value.into(),
            is_regex: false,
        }
    }
}

/// Reasons a query gets no suggestions at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unsuggestable {
    #[error("result type {0:?} is not a file search")]
    ResultType(String),

    #[error("{field}: value {value:?} is a predicate")]
    Predicate { field: String, value: String },

    #[error("query contains an or-expression")]
    Disjunction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Repo,
    File,
    Lang,
    Context,
    Revision,
    Type,
    Other,
}

impl Field {
    fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "repo" | "r" => Field::Repo,
            "file" | "f" | "path" => Field::File,
            "lang" | "l" | "language" => Field::Lang,
            "context" => Field::Context,
            "rev" | "revision" => Field::Revision,
            "type" => Field::Type,
            _ => Field::Other,
        }
    }
}

/// A query flattened into the pieces producers care about.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuggestionInput {
    /// Pattern terms joined by a single space.
    pub pattern: String,
    pub is_regex: bool,
    pub repo_filters: Vec<String>,
    pub file_filters: Vec<String>,
    pub lang_filters: Vec<String>,
    pub context: Option<String>,
    pub revision: Option<String>,
}

impl SuggestionInput {
    /// Flattens `query`, or explains why it should get no suggestions.
    pub fn from_query(query: &SuggestionQuery) -> Result<Self, Unsuggestable> {
        let mut input = SuggestionInput::default();
        let mut terms = Vec::new();
        input.collect(query, &mut terms)?;
        input.pattern = terms.join(" ");
        Ok(input)
    }

    fn collect(
        &mut self,
        node: &SuggestionQuery,
        terms: &mut Vec<String>,
    ) -> Result<(), Unsuggestable> {
        match node {
            SuggestionQuery::Or(_) => Err(Unsuggestable::Disjunction),
            SuggestionQuery::And(children) => {
                for child in children {
                    self.collect(child, terms)?;
                }
                Ok(())
            }
            SuggestionQuery::Pattern { value, is_regex } => {
                if !value.is_empty() {
                    terms.push(value.clone());
                    self.is_regex |= *is_regex;
                }
                Ok(())
            }
            SuggestionQuery::Parameter {
                field,
                value,
                negated,
            } => self.add_parameter(field, value, *negated),
        }
    }

    fn add_parameter(
        &mut self,
        field: &str,
        value: &str,
        negated: bool,
    ) -> Result<(), Unsuggestable> {
        if is_predicate(value) {
            return Err(Unsuggestable::Predicate {
                field: field.to_string(),
                value: value.to_string(),
            });
        }

        let field = Field::parse(field);
        if field == Field::Type {
            if !value.eq_ignore_ascii_case("file") {
                return Err(Unsuggestable::ResultType(value.to_string()));
            }
            return Ok(());
        }

        // Exclusions never narrow what gets suggested.
        if negated {
            return Ok(());
        }

        match field {
            Field::Repo => {
                let (name, rev) = match value.split_once('@') {
                    Some((name, rev)) => (name, Some(rev)),
                    None => (value, None),
                };
                if let Some(rev) = rev.filter(|rev| !rev.is_empty()) {
                    self.revision.get_or_insert_with(|| rev.to_string());
                }
                if !name.is_empty() {
                    self.repo_filters.push(name.to_string());
                }
            }
            Field::File => self.file_filters.push(value.to_string()),
            Field::Lang => self.lang_filters.push(value.to_string()),
            Field::Context => self.context = Some(value.to_string()),
            Field::Revision => self.revision = Some(value.to_string()),
            Field::Type | Field::Other => {}
        }
        Ok(())
    }

    /// Term to complete repository names against.
    pub fn repo_term(&self) -> Option<&str> {
        last_or_pattern(&self.repo_filters, &self.pattern)
    }

    /// Term to complete file and directory paths against.
    pub fn path_term(&self) -> Option<&str> {
        last_or_pattern(&self.file_filters, &self.pattern)
    }

    pub fn lang_term(&self) -> Option<&str> {
        last_or_pattern(&self.lang_filters, &self.pattern)
    }

    pub fn pattern_term(&self) -> Option<&str> {
        Some(self.pattern.as_str()).filter(|pattern| !pattern.is_empty())
    }
}

fn last_or_pattern<'a>(filters: &'a [String], pattern: &'a str) -> Option<&'a str> {
    filters
        .last()
        .map(String::as_str)
        .or(Some(pattern))
        .filter(|term| !term.is_empty())
}

/// `name(args)` values such as `contains.file(path:README)` need evaluating
/// against the index before they mean anything.
fn is_predicate(value: &str) -> bool {
    let Some((name, rest)) = value.split_once('(') else {
        return false;
    };
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
        && rest.ends_with(')')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn negated(field: &str, value: &str) -> SuggestionQuery {
        SuggestionQuery::Parameter {
            field: field.to_string(),
            value: value.to_string(),
            negated: true,
        }
    }

    #[test]
    fn flattens_filters_and_pattern() {
        let query = SuggestionQuery::And(vec![
            SuggestionQuery::parameter("repo", "acme/api@release"),
            SuggestionQuery::parameter("f", "src/"),
            SuggestionQuery::parameter("lang", "rust"),
            negated("file", "test"),
            SuggestionQuery::parameter("type", "file"),
            SuggestionQuery::pattern("fn"),
            SuggestionQuery::pattern("main"),
        ]);

        let input = SuggestionInput::from_query(&query).unwrap();
        assert_eq!(
            input,
            SuggestionInput {
                pattern: "fn main".to_string(),
                is_regex: false,
                repo_filters: vec!["acme/api".to_string()],
                file_filters: vec!["src/".to_string()],
                lang_filters: vec!["rust".to_string()],
                context: None,
                revision: Some("release".to_string()),
            }
        );
        assert_eq!(input.path_term(), Some("src/"));
        assert_eq!(input.pattern_term(), Some("fn main"));
    }

    #[test]
    fn explicit_rev_wins_over_repo_suffix() {
        let query = SuggestionQuery::And(vec![
            SuggestionQuery::parameter("rev", "v2"),
            SuggestionQuery::parameter("repo", "acme/api@v1"),
        ]);
        let input = SuggestionInput::from_query(&query).unwrap();
        assert_eq!(input.revision.as_deref(), Some("v2"));
    }

    #[test]
    fn non_file_result_type_is_unsuggestable() {
        let query = SuggestionQuery::And(vec![
            SuggestionQuery::parameter("type", "commit"),
            SuggestionQuery::pattern("fix"),
        ]);
        assert_eq!(
            SuggestionInput::from_query(&query),
            Err(Unsuggestable::ResultType("commit".to_string()))
        );
    }

    #[test]
    fn predicate_is_unsuggestable() {
        let query = SuggestionQuery::parameter("repo", "contains.file(path:README)");
        assert!(matches!(
            SuggestionInput::from_query(&query),
            Err(Unsuggestable::Predicate { .. })
        ));

        // Parentheses inside a regex are not a predicate.
        let regex = SuggestionQuery::parameter("file", "(foo|bar)\\.rs");
        assert!(SuggestionInput::from_query(&regex).is_ok());
    }

    #[test]
    fn nested_or_is_unsuggestable() {
        let query = SuggestionQuery::And(vec![
            SuggestionQuery::parameter("repo", "acme"),
            SuggestionQuery::Or(vec![
                SuggestionQuery::pattern("foo"),
                SuggestionQuery::pattern("bar"),
            ]),
        ]);
        assert_eq!(
            SuggestionInput::from_query(&query),
            Err(Unsuggestable::Disjunction)
        );
    }

    #[test]
    fn empty_terms_fall_back_to_pattern() {
        let input = SuggestionInput::from_query(&SuggestionQuery::pattern("serde")).unwrap();
        assert_eq!(input.repo_term(), Some("serde"));
        assert_eq!(input.lang_term(), Some("serde"));

        let empty = SuggestionInput::from_query(&SuggestionQuery::And(Vec::new())).unwrap();
        assert_eq!(empty.repo_term(), None);
        assert_eq!(empty.pattern_term(), None);
    }
}
