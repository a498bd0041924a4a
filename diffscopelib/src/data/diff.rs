//! Changed-line computation between two revisions.
//!
//! This module provides three layers:
//! - `DiffCalculator::diff_commits` walks two commit trees with rename and
//!   copy detection and computes the edits of every changed path
//! - `DiffCalculator::diff_staged` compares the working index against a base
//!   revision for paths that are added or modified but not yet committed
//! - `DiffCalculator::calculate_diff` composes the two, reporting each path
//!   once and preferring its staged state
//!
//! ## Design Principle
//!
//! **Path filtering is done centrally using `FilterConfig`, not re-implemented
//! per differ.** A path rejected by the filter is skipped by both differs, so
//! it can never end up in the staged exclusion set either.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::error::DiffscopeError;
use crate::source::content::{ContentOrigin, ContentSource, EntryKind, DEFAULT_BIG_FILE_THRESHOLD};
use crate::source::filter::FilterConfig;
use crate::source::revision::{resolve_revision, Revision};
use crate::Result;

use super::edit::{DiffAlgorithm, EditCalculator, LineComparison};
use super::entry::{canonical_root, ChangeKind, DiffEntry};

/// Computes per-file edit lists between revisions and the working index.
#[derive(Debug, Clone)]
pub struct DiffCalculator {
    edits: EditCalculator,
    big_file_threshold: u64,
    filter: FilterConfig,
}

impl Default for DiffCalculator {
    fn default() -> Self {
        Self {
            edits: EditCalculator::new(),
            big_file_threshold: DEFAULT_BIG_FILE_THRESHOLD,
            filter: FilterConfig::new(),
        }
    }
}

/// One side of a changed path, as reported by the tree or index walk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Side {
    pub(crate) id: gix::ObjectId,
    pub(crate) kind: EntryKind,
}

/// Internal representation of a changed path before its content is loaded.
#[derive(Debug)]
pub(crate) struct PathChange {
    pub(crate) change: ChangeKind,
    pub(crate) old_path: Option<String>,
    pub(crate) new_path: Option<String>,
    pub(crate) old: Option<Side>,
    pub(crate) new: Option<Side>,
}

impl PathChange {
    fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or_default()
    }
}

impl DiffCalculator {
    /// Create a calculator with the histogram algorithm, exact line
    /// comparison and the default big-file threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the line diff algorithm.
    pub fn algorithm(mut self, algorithm: DiffAlgorithm) -> Self {
        self.edits = self.edits.algorithm(algorithm);
        self
    }

    /// Set the line comparison mode.
    pub fn comparison(mut self, comparison: LineComparison) -> Self {
        self.edits = self.edits.comparison(comparison);
        self
    }

    /// Set the size above which content is treated as binary.
    pub fn big_file_threshold(mut self, bytes: u64) -> Self {
        self.big_file_threshold = bytes;
        self
    }

    /// Set the path filter.
    pub fn filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Compute the diff between two revision expressions.
    ///
    /// With `include_staged`, paths that are added or modified in the index
    /// are reported from their staged content and left out of the commit diff.
    pub fn calculate_diff(
        &self,
        repo_path: impl AsRef<Path>,
        old_rev: &str,
        new_rev: &str,
        include_staged: bool,
    ) -> Result<Vec<DiffEntry>> {
        let repo = open_repository(repo_path.as_ref())?;

        let resolved = resolve_revision(&repo, old_rev)
            .and_then(|old| resolve_revision(&repo, new_rev).map(|new| (old, new)));
        let (old, new) = match resolved {
            Ok(pair) => pair,
            Err(e) => {
                error!(
                    "failed to resolve revisions old [{}] and new [{}]: {}",
                    old_rev, new_rev, e
                );
                return Err(e);
            }
        };

        self.calculate(&repo, &old, &new, include_staged)
    }

    /// Compute the diff between two resolved revisions.
    pub fn calculate(
        &self,
        repo: &gix::Repository,
        old: &Revision,
        new: &Revision,
        include_staged: bool,
    ) -> Result<Vec<DiffEntry>> {
        let mut entries = Vec::new();

        if include_staged {
            entries.extend(self.diff_staged(repo, old)?);
        }

        let staged_paths: HashSet<String> = entries
            .iter()
            .filter_map(|entry: &DiffEntry| entry.new_path.clone())
            .collect();

        let staged_count = entries.len();
        entries.extend(self.diff_commits(repo, old, new, &staged_paths)?);

        info!(
            "diff {}..{}: {} staged, {} committed file changes",
            old.spec(),
            new.spec(),
            staged_count,
            entries.len() - staged_count
        );

        Ok(entries)
    }

    /// Diff two commits with rename and copy detection.
    ///
    /// New paths listed in `exclude_paths` are skipped.
    pub fn diff_commits(
        &self,
        repo: &gix::Repository,
        old: &Revision,
        new: &Revision,
        exclude_paths: &HashSet<String>,
    ) -> Result<Vec<DiffEntry>> {
        if old.id() == new.id() || old.tree_id() == new.tree_id() {
            debug!("{} and {} share a tree; nothing to diff", old.spec(), new.spec());
            return Ok(Vec::new());
        }

        let root = repository_root(repo)?;
        let old_tree = find_tree(repo, old.tree_id())?;
        let new_tree = find_tree(repo, new.tree_id())?;
        let changes = compute_tree_changes(&old_tree, &new_tree)?;

        let source = ContentSource::new(repo, self.big_file_threshold);
        let mut entries = Vec::new();

        for change in changes {
            if change
                .new_path
                .as_ref()
                .is_some_and(|path| exclude_paths.contains(path))
            {
                debug!("{} is covered by the staged diff", change.path());
                continue;
            }
            if !self.filter.matches(change.path()) {
                debug!("{} rejected by path filter", change.path());
                continue;
            }
            entries.push(self.entry_for(&source, &root, change, ContentOrigin::Committed)?);
        }

        Ok(entries)
    }

    /// Diff the working index against `base` for paths added or modified
    /// relative to HEAD but not yet committed.
    ///
    /// Unmerged and intent-to-add index entries carry no staged content and
    /// are left to the commit diff.
    pub fn diff_staged(&self, repo: &gix::Repository, base: &Revision) -> Result<Vec<DiffEntry>> {
        let root = repository_root(repo)?;
        let index = repo
            .index_or_empty()
            .map_err(|e| DiffscopeError::GitError(format!("Failed to read index: {}", e)))?;

        let head_entries = head_tree_entries(repo)?;
        let mut base_entries = HashMap::new();
        let base_tree = find_tree(repo, base.tree_id())?;
        collect_tree_entries(repo, &base_tree, "", &mut base_entries)?;

        let mut changes = Vec::new();
        for entry in index.entries() {
            let path = entry.path(&index).to_string();
            if entry.stage_raw() != 0 {
                debug!("{} is unmerged (stage {}); skipping", path, entry.stage_raw());
                continue;
            }
            if entry
                .flags
                .contains(gix::index::entry::Flags::INTENT_TO_ADD)
            {
                debug!("{} is only marked intent-to-add; skipping", path);
                continue;
            }
            let staged = Side {
                id: entry.id,
                kind: if entry.mode == gix::index::entry::Mode::COMMIT {
                    EntryKind::Gitlink
                } else {
                    EntryKind::Blob
                },
            };

            let is_staged_change = match head_entries.get(&path) {
                None => true,
                Some(head) => head.id != staged.id,
            };
            if !is_staged_change || !self.filter.matches(&path) {
                continue;
            }

            let old = base_entries.get(&path).copied();
            changes.push(PathChange {
                change: if old.is_some() {
                    ChangeKind::Modify
                } else {
                    ChangeKind::Add
                },
                old_path: old.map(|_| path.clone()),
                new_path: Some(path),
                old,
                new: Some(staged),
            });
        }
        changes.sort_by(|a, b| a.path().cmp(b.path()));

        let source = ContentSource::new(repo, self.big_file_threshold);
        changes
            .into_iter()
            .map(|change| self.entry_for(&source, &root, change, ContentOrigin::Index))
            .collect()
    }

    /// Load both sides of a change and compute its edits.
    fn entry_for(
        &self,
        source: &ContentSource<'_>,
        root: &Path,
        change: PathChange,
        new_origin: ContentOrigin,
    ) -> Result<DiffEntry> {
        let old_content = match change.old {
            Some(side) => source.open(side.kind, Some(side.id), ContentOrigin::Committed)?,
            None => source.open(EntryKind::Missing, None, ContentOrigin::Committed)?,
        };
        let new_content = match change.new {
            Some(side) => source.open(side.kind, Some(side.id), new_origin)?,
            None => source.open(EntryKind::Missing, None, new_origin)?,
        };

        let edits = self
            .edits
            .compute_content_edits(&old_content, &new_content);
        debug!(
            "{:?} {}: {} edits",
            change.change,
            change.path(),
            edits.len()
        );

        Ok(DiffEntry::new(
            root,
            change.change,
            change.old_path,
            change.new_path,
            edits,
        )
        .with_ids(
            change.old.map(|side| side.id),
            change.new.map(|side| side.id),
        ))
    }
}

/// Open the repository containing `path`.
pub(crate) fn open_repository(path: &Path) -> Result<gix::Repository> {
    gix::discover(path)
        .map_err(|e| DiffscopeError::GitError(format!("Failed to discover git repository: {}", e)))
}

/// Canonical work tree root of a repository.
pub(crate) fn repository_root(repo: &gix::Repository) -> Result<PathBuf> {
    let work_dir = repo
        .work_dir()
        .ok_or_else(|| DiffscopeError::GitError("Repository has no work directory".to_string()))?;
    Ok(canonical_root(work_dir))
}

pub(crate) fn find_tree(repo: &gix::Repository, id: gix::ObjectId) -> Result<gix::Tree<'_>> {
    repo.find_object(id)
        .map_err(|e| DiffscopeError::GitError(format!("Failed to find tree {}: {}", id, e)))?
        .try_into_tree()
        .map_err(|_| DiffscopeError::GitError(format!("Object {} is not a tree", id)))
}

/// Rename detection settings: 50% similarity for renames and for copies
/// from modified files.
pub(crate) fn rewrites() -> gix::diff::Rewrites {
    gix::diff::Rewrites {
        copies: Some(gix::diff::rewrites::Copies::default()),
        ..Default::default()
    }
}

/// Compute the changed paths between two trees, with rewrites detected.
pub(crate) fn compute_tree_changes(
    old_tree: &gix::Tree<'_>,
    new_tree: &gix::Tree<'_>,
) -> Result<Vec<PathChange>> {
    use gix::object::tree::diff::{Action, Change};

    let mut changes = Vec::new();

    let mut platform = old_tree
        .changes()
        .map_err(|e| DiffscopeError::GitError(format!("Failed to get tree changes: {}", e)))?;
    platform.options(|opts| {
        opts.track_path().track_rewrites(Some(rewrites()));
    });
    platform
        .for_each_to_obtain_tree(new_tree, |change| {
            let path_change = match change {
                Change::Addition {
                    entry_mode,
                    id,
                    location,
                    ..
                } => EntryKind::from_tree_mode(entry_mode).map(|kind| PathChange {
                    change: ChangeKind::Add,
                    old_path: None,
                    new_path: Some(location.to_string()),
                    old: None,
                    new: Some(Side {
                        id: id.detach(),
                        kind,
                    }),
                }),
                Change::Deletion {
                    entry_mode,
                    id,
                    location,
                    ..
                } => EntryKind::from_tree_mode(entry_mode).map(|kind| PathChange {
                    change: ChangeKind::Delete,
                    old_path: Some(location.to_string()),
                    new_path: None,
                    old: Some(Side {
                        id: id.detach(),
                        kind,
                    }),
                    new: None,
                }),
                Change::Modification {
                    previous_entry_mode,
                    previous_id,
                    entry_mode,
                    id,
                    location,
                    ..
                } => {
                    let old = EntryKind::from_tree_mode(previous_entry_mode).map(|kind| Side {
                        id: previous_id.detach(),
                        kind,
                    });
                    let new = EntryKind::from_tree_mode(entry_mode).map(|kind| Side {
                        id: id.detach(),
                        kind,
                    });
                    let path = location.to_string();
                    match (old, new) {
                        (None, None) => None,
                        (old, new) => Some(PathChange {
                            change: ChangeKind::Modify,
                            old_path: old.map(|_| path.clone()),
                            new_path: new.map(|_| path.clone()),
                            old,
                            new,
                        }),
                    }
                }
                Change::Rewrite {
                    source_location,
                    source_entry_mode,
                    source_id,
                    entry_mode,
                    id,
                    location,
                    copy,
                    ..
                } => {
                    let old = EntryKind::from_tree_mode(source_entry_mode);
                    let new = EntryKind::from_tree_mode(entry_mode);
                    match (old, new) {
                        (Some(old), Some(new)) => Some(PathChange {
                            change: if copy {
                                ChangeKind::Copy
                            } else {
                                ChangeKind::Rename
                            },
                            old_path: Some(source_location.to_string()),
                            new_path: Some(location.to_string()),
                            old: Some(Side {
                                id: source_id.detach(),
                                kind: old,
                            }),
                            new: Some(Side {
                                id: id.detach(),
                                kind: new,
                            }),
                        }),
                        _ => None,
                    }
                }
            };

            if let Some(pc) = path_change {
                changes.push(pc);
            }
            Ok::<_, std::convert::Infallible>(Action::Continue)
        })
        .map_err(|e| DiffscopeError::GitError(format!("Failed to compute tree diff: {}", e)))?;

    Ok(changes)
}

/// Blob and submodule entries of HEAD's tree; empty when HEAD is unborn.
fn head_tree_entries(repo: &gix::Repository) -> Result<HashMap<String, Side>> {
    let mut entries = HashMap::new();
    let head = repo
        .head()
        .map_err(|e| DiffscopeError::GitError(format!("Failed to read HEAD: {}", e)))?;
    if head.is_unborn() {
        return Ok(entries);
    }

    let tree = repo
        .head_commit()
        .map_err(|e| DiffscopeError::GitError(format!("Failed to get HEAD commit: {}", e)))?
        .tree()
        .map_err(|e| DiffscopeError::GitError(format!("Failed to get HEAD tree: {}", e)))?;
    collect_tree_entries(repo, &tree, "", &mut entries)?;
    Ok(entries)
}

/// Recursively collect all blob and submodule entries from a tree.
fn collect_tree_entries(
    repo: &gix::Repository,
    tree: &gix::Tree<'_>,
    prefix: &str,
    entries: &mut HashMap<String, Side>,
) -> Result<()> {
    for entry in tree.iter() {
        let entry = entry
            .map_err(|e| DiffscopeError::GitError(format!("Failed to read tree entry: {}", e)))?;

        let name = entry.filename().to_string();
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };

        if entry.mode().is_tree() {
            let subtree = find_tree(repo, entry.oid().to_owned())?;
            collect_tree_entries(repo, &subtree, &path, entries)?;
        } else if let Some(kind) = EntryKind::from_tree_mode(entry.mode()) {
            entries.insert(
                path,
                Side {
                    id: entry.oid().to_owned(),
                    kind,
                },
            );
        }
    }
    Ok(())
}
