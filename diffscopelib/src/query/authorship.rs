//! Filtering coverage by who last touched each line.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::blame::{BlameResult, Identity};
use crate::data::entry::{canonical_root, resolve_absolute};

use super::coverage::{ignore_all, ignore_spans_except, IgnoreSink, Insn, InstructionFilter};
use super::paths::{SourceKey, SourceLayout};

/// Name/email predicate over a commit identity.
///
/// A blank field matches anything; a set field must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonQuery {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl PersonQuery {
    pub fn new(name: Option<&str>, email: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    pub fn by_name(name: &str) -> Self {
        Self::new(Some(name), None)
    }

    pub fn by_email(email: &str) -> Self {
        Self::new(None, Some(email))
    }

    /// Whether neither field constrains anything.
    pub fn is_blank(&self) -> bool {
        blank(&self.name) && blank(&self.email)
    }

    /// Whether `identity` satisfies the query. A missing identity never does.
    pub fn accepts(&self, identity: Option<&Identity>) -> bool {
        let Some(identity) = identity else {
            return false;
        };
        if !blank(&self.name) && self.name.as_deref() != Some(identity.name.as_str()) {
            return false;
        }
        if !blank(&self.email) && self.email.as_deref() != identity.email.as_deref() {
            return false;
        }
        true
    }
}

fn blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |value| value.trim().is_empty())
}

/// Which identity of a blamed line is matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonKind {
    #[default]
    Author,
    Committer,
}

impl PersonKind {
    /// The identity of 0-based `line` in `blame`.
    pub fn identity(self, blame: &BlameResult, line: usize) -> Option<&Identity> {
        match self {
            PersonKind::Author => blame.source_author(line),
            PersonKind::Committer => blame.source_committer(line),
        }
    }
}

/// Keeps only spans whose line was last touched by the queried person.
///
/// Methods of files without a blame result are ignored entirely, and so is
/// everything when there is no query to match.
#[derive(Debug, Clone, Default)]
pub struct AuthorshipFilter {
    blame: HashMap<SourceKey, BlameResult>,
    kind: PersonKind,
    query: Option<PersonQuery>,
}

impl AuthorshipFilter {
    /// Build from blame results whose paths are relative to `repo_root`.
    pub fn new(
        results: Vec<BlameResult>,
        repo_root: &Path,
        layout: &SourceLayout,
        kind: PersonKind,
        query: Option<PersonQuery>,
    ) -> Self {
        let root = canonical_root(repo_root);
        let mut blame = HashMap::new();
        for result in results {
            let absolute = resolve_absolute(&root, &result.path);
            match layout.key_for(&absolute) {
                Some(key) => {
                    blame.insert(key, result);
                }
                None => debug!("{} is outside the source layout", result.path),
            }
        }
        Self { blame, kind, query }
    }

    pub fn kind(&self) -> PersonKind {
        self.kind
    }

    pub fn query(&self) -> Option<&PersonQuery> {
        self.query.as_ref()
    }

    pub fn len(&self) -> usize {
        self.blame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blame.is_empty()
    }
}

impl InstructionFilter for AuthorshipFilter {
    fn filter(&self, key: &SourceKey, instructions: &[Insn], sink: &mut dyn IgnoreSink) {
        let (Some(query), Some(blame)) = (&self.query, self.blame.get(key)) else {
            ignore_all(instructions, sink);
            return;
        };

        ignore_spans_except(instructions, sink, |line| {
            let Some(index) = (line as usize).checked_sub(1) else {
                return false;
            };
            query.accepts(self.kind.identity(blame, index))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::blame::BlameLine;
    use tempfile::tempdir;

    use super::Insn::{LineMarker, Other};

    fn line(author: &str, committer: &str) -> BlameLine {
        BlameLine {
            commit: "0".repeat(40),
            author: Some(Identity::new(author, Some(format!("{author}@example.com").as_str()))),
            committer: Some(Identity::new(
                committer,
                Some(format!("{committer}@example.com").as_str()),
            )),
            source_path: "src/main/java/a/A.java".to_string(),
            source_line: 0,
        }
    }

    fn blame() -> BlameResult {
        BlameResult {
            path: "src/main/java/a/A.java".to_string(),
            lines: vec![line("alice", "carol"), line("bob", "carol"), line("alice", "dave")],
        }
    }

    fn method() -> Vec<Insn> {
        vec![LineMarker(1), Other, LineMarker(2), Other, LineMarker(3), Other]
    }

    fn filter(kind: PersonKind, query: Option<PersonQuery>) -> AuthorshipFilter {
        let temp = tempdir().unwrap();
        let layout = SourceLayout::new(temp.path());
        AuthorshipFilter::new(vec![blame()], temp.path(), &layout, kind, query)
    }

    #[test]
    fn test_query_matching() {
        let alice = Identity::new("alice", Some("alice@example.com"));
        let anonymous = Identity::new("alice", None);

        assert!(PersonQuery::by_name("alice").accepts(Some(&alice)));
        assert!(PersonQuery::by_email("alice@example.com").accepts(Some(&alice)));
        assert!(!PersonQuery::by_name("bob").accepts(Some(&alice)));
        assert!(!PersonQuery::by_email("alice@example.com").accepts(Some(&anonymous)));
        assert!(PersonQuery::new(Some(" "), Some("")).accepts(Some(&alice)));
        assert!(PersonQuery::new(Some(" "), None).is_blank());
        assert!(!PersonQuery::by_name("alice").accepts(None));
    }

    #[test]
    fn test_person_kind_selects_identity() {
        let blame = blame();
        assert_eq!(PersonKind::Author.identity(&blame, 1).unwrap().name, "bob");
        assert_eq!(PersonKind::Committer.identity(&blame, 2).unwrap().name, "dave");
        assert!(PersonKind::Author.identity(&blame, 3).is_none());
    }

    #[test]
    fn test_author_filter_keeps_matching_lines() {
        let filter = filter(PersonKind::Author, Some(PersonQuery::by_name("alice")));
        assert_eq!(filter.len(), 1);

        let mut ignored: Vec<(usize, usize)> = Vec::new();
        filter.filter(&SourceKey::from("a/A.java"), &method(), &mut ignored);
        assert_eq!(ignored, vec![(2, 4)]);
    }

    #[test]
    fn test_committer_filter() {
        let filter = filter(PersonKind::Committer, Some(PersonQuery::by_name("carol")));

        let mut ignored: Vec<(usize, usize)> = Vec::new();
        filter.filter(&SourceKey::from("a/A.java"), &method(), &mut ignored);
        assert_eq!(ignored, vec![(4, 5)]);
    }

    #[test]
    fn test_file_without_blame_is_ignored_entirely() {
        let filter = filter(PersonKind::Author, Some(PersonQuery::by_name("alice")));

        let mut ignored: Vec<(usize, usize)> = Vec::new();
        filter.filter(&SourceKey::from("b/B.java"), &method(), &mut ignored);
        assert_eq!(ignored, vec![(0, 5)]);
    }

    #[test]
    fn test_without_query_everything_is_ignored() {
        let filter = filter(PersonKind::Author, None);
        assert!(filter.query().is_none());

        let mut ignored: Vec<(usize, usize)> = Vec::new();
        filter.filter(&SourceKey::from("a/A.java"), &method(), &mut ignored);
        assert_eq!(ignored, vec![(0, 5)]);
    }

    #[test]
    fn test_lines_beyond_blame_are_ignored() {
        let filter = filter(PersonKind::Author, Some(PersonQuery::by_name("alice")));
        let method = vec![LineMarker(1), Other, LineMarker(9), Other];

        let mut ignored: Vec<(usize, usize)> = Vec::new();
        filter.filter(&SourceKey::from("a/A.java"), &method, &mut ignored);
        assert_eq!(ignored, vec![(2, 3)]);
    }
}
