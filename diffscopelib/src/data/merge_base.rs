//! Merge base computation.
//!
//! Both tips are walked newest-first, painting every reached commit with the
//! side(s) it is reachable from. A commit painted from both sides is a common
//! ancestor; everything behind it is marked stale so the walk stops once
//! only stale commits remain. When several common ancestors survive, those
//! reachable from another candidate are dropped.

use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::error::DiffscopeError;
use crate::source::revision::resolve_revision;
use crate::Result;

use super::diff::open_repository;

const FROM_FIRST: u8 = 0b0001;
const FROM_SECOND: u8 = 0b0010;
const FROM_BOTH: u8 = FROM_FIRST | FROM_SECOND;
const STALE: u8 = 0b0100;
const RESULT: u8 = 0b1000;

/// Commit time and parents, loaded once per walk.
struct CommitGraph<'repo> {
    repo: &'repo gix::Repository,
    cache: HashMap<gix::ObjectId, (i64, Vec<gix::ObjectId>)>,
}

impl<'repo> CommitGraph<'repo> {
    fn new(repo: &'repo gix::Repository) -> Self {
        Self {
            repo,
            cache: HashMap::new(),
        }
    }

    fn load(&mut self, id: gix::ObjectId) -> Result<&(i64, Vec<gix::ObjectId>)> {
        if !self.cache.contains_key(&id) {
            let commit = self
                .repo
                .find_commit(id)
                .map_err(|_| DiffscopeError::MissingObject { id: id.to_string() })?;
            let time = commit
                .time()
                .map_err(|e| DiffscopeError::GitError(format!("Failed to read commit {}: {}", id, e)))?
                .seconds;
            let parents = commit.parent_ids().map(|p| p.detach()).collect();
            self.cache.insert(id, (time, parents));
        }
        self.cache
            .get(&id)
            .ok_or_else(|| DiffscopeError::MissingObject { id: id.to_string() })
    }

    fn time(&mut self, id: gix::ObjectId) -> Result<i64> {
        Ok(self.load(id)?.0)
    }

    fn parents(&mut self, id: gix::ObjectId) -> Result<Vec<gix::ObjectId>> {
        Ok(self.load(id)?.1.clone())
    }

    /// Whether `ancestor` is reachable from `tip`.
    fn reaches(&mut self, tip: gix::ObjectId, ancestor: gix::ObjectId) -> Result<bool> {
        let mut seen = HashSet::new();
        let mut pending = vec![tip];
        while let Some(id) = pending.pop() {
            if id == ancestor {
                return Ok(true);
            }
            if !seen.insert(id) {
                continue;
            }
            pending.extend(self.parents(id)?);
        }
        Ok(false)
    }
}

/// Find a best common ancestor of two commits, or `None` for unrelated histories.
pub(crate) fn merge_base_of(
    repo: &gix::Repository,
    first: gix::ObjectId,
    second: gix::ObjectId,
) -> Result<Option<gix::ObjectId>> {
    if first == second {
        return Ok(Some(first));
    }

    let mut graph = CommitGraph::new(repo);
    let mut flags: HashMap<gix::ObjectId, u8> = HashMap::new();
    let mut queue = BinaryHeap::new();
    let mut candidates = Vec::new();

    flags.insert(first, FROM_FIRST);
    flags.insert(second, FROM_SECOND);
    queue.push((graph.time(first)?, first));
    queue.push((graph.time(second)?, second));

    while has_live_entries(&queue, &flags) {
        let Some((_, id)) = queue.pop() else {
            break;
        };
        let mut state = flags.get(&id).copied().unwrap_or_default();

        if state & FROM_BOTH == FROM_BOTH {
            if state & RESULT == 0 {
                flags.insert(id, state | RESULT);
                candidates.push(id);
            }
            // Only what lies behind a common ancestor is stale.
            state |= STALE;
        }

        let painted = state & (FROM_BOTH | STALE);
        for parent in graph.parents(id)? {
            let parent_state = flags.get(&parent).copied().unwrap_or_default();
            if parent_state & painted == painted {
                continue;
            }
            flags.insert(parent, parent_state | painted);
            queue.push((graph.time(parent)?, parent));
        }
    }

    // A candidate painted stale later lies behind another common ancestor.
    candidates.retain(|id| flags.get(id).is_some_and(|state| state & STALE == 0));
    debug!("merge base candidates for {} and {}: {:?}", first, second, candidates);

    let mut best = Vec::new();
    for &candidate in &candidates {
        let mut redundant = false;
        for &other in &candidates {
            if other != candidate && graph.reaches(other, candidate)? {
                redundant = true;
                break;
            }
        }
        if !redundant {
            best.push(candidate);
        }
    }

    let mut newest: Option<(i64, gix::ObjectId)> = None;
    for id in best {
        let key = (graph.time(id)?, id);
        if newest.map_or(true, |current| key > current) {
            newest = Some(key);
        }
    }
    Ok(newest.map(|(_, id)| id))
}

fn has_live_entries(queue: &BinaryHeap<(i64, gix::ObjectId)>, flags: &HashMap<gix::ObjectId, u8>) -> bool {
    queue
        .iter()
        .any(|(_, id)| flags.get(id).map_or(true, |state| state & STALE == 0))
}

/// Compute the merge base of two revision expressions.
///
/// Returns the full hex id of the merge base, or an empty string when the
/// two revisions share no history.
pub fn calculate_merge_base(
    repo_path: impl AsRef<Path>,
    first: &str,
    second: &str,
) -> Result<String> {
    let repo = open_repository(repo_path.as_ref())?;
    let first_rev = resolve_revision(&repo, first)?;
    let second_rev = resolve_revision(&repo, second)?;

    let base = merge_base_of(&repo, first_rev.id(), second_rev.id())?;
    match base {
        Some(id) => {
            info!("merge base of {} and {} is {}", first, second, id);
            Ok(id.to_string())
        }
        None => {
            info!("{} and {} have no common ancestor", first, second);
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestRepo;

    #[test]
    fn test_merge_base_of_diverged_branches() {
        let repo = TestRepo::init();
        repo.write("a.txt", "base\n");
        let base = repo.commit_all("base");
        repo.git(&["checkout", "-q", "-b", "feature"]);
        repo.write("a.txt", "feature\n");
        repo.commit_all("feature 1");
        repo.write("a.txt", "feature again\n");
        repo.commit_all("feature 2");
        repo.git(&["checkout", "-q", "main"]);
        repo.write("b.txt", "main\n");
        repo.commit_all("main 1");

        assert_eq!(
            calculate_merge_base(repo.path(), "main", "feature").unwrap(),
            base
        );
        assert_eq!(
            calculate_merge_base(repo.path(), "feature", "main").unwrap(),
            base
        );
    }

    #[test]
    fn test_merge_base_of_ancestor_is_ancestor() {
        let repo = TestRepo::init();
        repo.write("a.txt", "one\n");
        let first = repo.commit_all("first");
        repo.write("a.txt", "two\n");
        repo.commit_all("second");

        assert_eq!(
            calculate_merge_base(repo.path(), "HEAD", "HEAD~1").unwrap(),
            first
        );
        assert_eq!(calculate_merge_base(repo.path(), &first, &first).unwrap(), first);
    }

    #[test]
    fn test_merge_base_after_merge_picks_newest_common_commit() {
        let repo = TestRepo::init();
        repo.write("a.txt", "base\n");
        repo.commit_all("base");
        repo.git(&["checkout", "-q", "-b", "feature"]);
        repo.write("f.txt", "feature\n");
        let feature = repo.commit_all("feature 1");
        repo.git(&["checkout", "-q", "main"]);
        repo.write("m.txt", "main\n");
        repo.commit_all("main 1");
        repo.git(&["merge", "-q", "--no-edit", "feature"]);
        repo.git(&["checkout", "-q", "feature"]);
        repo.write("f.txt", "feature 2\n");
        repo.commit_all("feature 2");

        assert_eq!(
            calculate_merge_base(repo.path(), "main", "feature").unwrap(),
            feature
        );
    }

    #[test]
    fn test_unrelated_histories_have_no_merge_base() {
        let repo = TestRepo::init();
        repo.write("a.txt", "main\n");
        repo.commit_all("main");
        repo.git(&["checkout", "-q", "--orphan", "other"]);
        repo.write("a.txt", "other\n");
        repo.commit_all("other root");

        assert_eq!(calculate_merge_base(repo.path(), "main", "other").unwrap(), "");
    }

    #[test]
    fn test_unknown_ref_is_an_error() {
        let repo = TestRepo::init();
        repo.write("a.txt", "main\n");
        repo.commit_all("main");

        assert!(calculate_merge_base(repo.path(), "main", "nope").is_err());
    }
}
