//! Revision resolution.
//!
//! Turns revision expressions (branch names, tags, `HEAD~2`, abbreviated
//! ids, `A...B`) into immutable [`Revision`] values. A revision is resolved
//! once at the start of a request and only read afterwards.

use std::fmt;

use crate::data::merge_base::merge_base_of;
use crate::error::DiffscopeError;
use crate::Result;

/// An immutable, resolved point in history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision {
    /// The expression this revision was resolved from.
    spec: String,
    /// Commit id.
    id: gix::ObjectId,
    /// Root tree id of the commit.
    tree: gix::ObjectId,
}

impl Revision {
    /// The expression this revision was resolved from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// The commit id.
    pub fn id(&self) -> gix::ObjectId {
        self.id
    }

    /// The root tree id of the commit.
    pub fn tree_id(&self) -> gix::ObjectId {
        self.tree
    }

    /// Full hex form of the commit id.
    pub fn hex(&self) -> String {
        self.id.to_string()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.spec, self.id)
    }
}

/// Resolve a revision expression to a [`Revision`].
///
/// `A...B` resolves to the merge base of `A` and `B`; everything else is
/// handed to git's rev-parse and peeled to a commit, so annotated tags work.
pub fn resolve_revision(repo: &gix::Repository, spec: &str) -> Result<Revision> {
    if let Some((left, right)) = split_symmetric(spec) {
        let left = resolve_revision(repo, left)?;
        let right = resolve_revision(repo, right)?;
        let base = merge_base_of(repo, left.id, right.id)?.ok_or_else(|| {
            DiffscopeError::UnresolvedRevision {
                spec: spec.to_string(),
                message: "revisions have no common ancestor".to_string(),
            }
        })?;
        return revision_for_commit(repo, spec, base);
    }

    let id = repo
        .rev_parse_single(peeled_spec(spec).as_str())
        .map_err(|e| DiffscopeError::UnresolvedRevision {
            spec: spec.to_string(),
            message: e.to_string(),
        })?
        .detach();

    revision_for_commit(repo, spec, id)
}

/// Build a [`Revision`] for a commit id that is already known.
pub(crate) fn revision_for_commit(
    repo: &gix::Repository,
    spec: &str,
    id: gix::ObjectId,
) -> Result<Revision> {
    let commit = repo
        .find_commit(id)
        .map_err(|e| DiffscopeError::UnresolvedRevision {
            spec: spec.to_string(),
            message: format!("{} is not a commit: {}", id, e),
        })?;
    let tree = commit
        .tree_id()
        .map_err(|e| DiffscopeError::GitError(format!("Failed to read tree of {}: {}", id, e)))?
        .detach();

    Ok(Revision {
        spec: spec.to_string(),
        id,
        tree,
    })
}

/// Insert `^{commit}` so tags dereference, keeping ancestry operators after it
/// (`v1.2~3` becomes `v1.2^{commit}~3`).
fn peeled_spec(spec: &str) -> String {
    if spec.contains("^{") {
        return spec.to_string();
    }
    let ancestry = spec.find('~').into_iter().chain(spec.find('^')).min();
    match ancestry {
        Some(pos) => format!("{}^{{commit}}{}", &spec[..pos], &spec[pos..]),
        None => format!("{spec}^{{commit}}"),
    }
}

fn split_symmetric(spec: &str) -> Option<(&str, &str)> {
    let (left, right) = spec.split_once("...")?;
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestRepo;

    #[test]
    fn test_peeled_spec() {
        assert_eq!(peeled_spec("HEAD"), "HEAD^{commit}");
        assert_eq!(peeled_spec("v1.0~2"), "v1.0^{commit}~2");
        assert_eq!(peeled_spec("main^2"), "main^{commit}^2");
        assert_eq!(peeled_spec("HEAD^{tree}"), "HEAD^{tree}");
    }

    #[test]
    fn test_split_symmetric() {
        assert_eq!(split_symmetric("main...feature"), Some(("main", "feature")));
        assert_eq!(split_symmetric("main..feature"), None);
        assert_eq!(split_symmetric("...feature"), None);
    }

    #[test]
    fn test_resolve_branch_and_ancestry() {
        let repo = TestRepo::init();
        repo.write("a.txt", "one\n");
        let first = repo.commit_all("first");
        repo.write("a.txt", "two\n");
        let second = repo.commit_all("second");

        let git = repo.open();
        let head = resolve_revision(&git, "HEAD").unwrap();
        assert_eq!(head.hex(), second);
        assert_eq!(head.spec(), "HEAD");

        let parent = resolve_revision(&git, "HEAD~1").unwrap();
        assert_eq!(parent.hex(), first);
        assert_ne!(parent.tree_id(), head.tree_id());
    }

    #[test]
    fn test_resolve_annotated_tag() {
        let repo = TestRepo::init();
        repo.write("a.txt", "one\n");
        let first = repo.commit_all("first");
        repo.git(&["tag", "-a", "v1", "-m", "release"]);

        let git = repo.open();
        let tagged = resolve_revision(&git, "v1").unwrap();
        assert_eq!(tagged.hex(), first);
    }

    #[test]
    fn test_resolve_symmetric_uses_merge_base() {
        let repo = TestRepo::init();
        repo.write("a.txt", "base\n");
        let base = repo.commit_all("base");
        repo.git(&["checkout", "-q", "-b", "feature"]);
        repo.write("a.txt", "feature\n");
        repo.commit_all("feature");
        repo.git(&["checkout", "-q", "main"]);
        repo.write("b.txt", "main\n");
        repo.commit_all("main");

        let git = repo.open();
        let rev = resolve_revision(&git, "main...feature").unwrap();
        assert_eq!(rev.hex(), base);
    }

    #[test]
    fn test_resolve_unknown_revision_fails() {
        let repo = TestRepo::init();
        repo.write("a.txt", "one\n");
        repo.commit_all("first");

        let git = repo.open();
        let err = resolve_revision(&git, "no-such-branch").unwrap_err();
        assert!(matches!(err, DiffscopeError::UnresolvedRevision { ref spec, .. } if spec == "no-such-branch"));
        assert!(err.is_fatal_to_request());
    }
}
