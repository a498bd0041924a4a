//! File-level diff records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::edit::{Edit, EditKind};

/// Type of file change in the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// File was added.
    Add,
    /// File was modified in place.
    Modify,
    /// File was deleted.
    Delete,
    /// File was moved, possibly with modifications.
    Rename,
    /// File was copied from another path, possibly with modifications.
    Copy,
}

/// One changed file and the line edits that turn its old content into the new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// The type of change.
    pub change: ChangeKind,
    /// Repository-relative path on the old side (`None` for additions).
    pub old_path: Option<String>,
    /// Repository-relative path on the new side (`None` for deletions).
    pub new_path: Option<String>,
    /// Object id of the old side, if any.
    pub old_id: Option<String>,
    /// Object id of the new side, if any.
    pub new_id: Option<String>,
    /// The new path resolved against the canonical repository root.
    pub absolute_new_path: Option<PathBuf>,
    /// Ordered, non-overlapping edits.
    pub edits: Vec<Edit>,
}

impl DiffEntry {
    /// Build an entry, resolving the new path against `repo_root`.
    ///
    /// `repo_root` is expected to be canonical already (see [`canonical_root`]).
    pub fn new(
        repo_root: &Path,
        change: ChangeKind,
        old_path: Option<String>,
        new_path: Option<String>,
        edits: Vec<Edit>,
    ) -> Self {
        let absolute_new_path = new_path
            .as_deref()
            .map(|path| resolve_absolute(repo_root, path));
        Self {
            change,
            old_path,
            new_path,
            old_id: None,
            new_id: None,
            absolute_new_path,
            edits,
        }
    }

    /// Attach the object ids of both sides.
    pub fn with_ids(mut self, old_id: Option<gix::ObjectId>, new_id: Option<gix::ObjectId>) -> Self {
        self.old_id = old_id.map(|id| id.to_string());
        self.new_id = new_id.map(|id| id.to_string());
        self
    }

    /// Whether the file is deleted.
    pub fn is_deleted(&self) -> bool {
        self.change == ChangeKind::Delete
    }

    /// Whether every edit only removes lines.
    pub fn is_all_deleted_edits(&self) -> bool {
        self.edits.iter().all(|edit| edit.kind() == EditKind::Delete)
    }

    /// The path this entry is known by: the new path, or the old one for deletions.
    pub fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or_default()
    }
}

/// Canonicalize a root directory.
///
/// A root whose canonical form cannot be determined falls back to the
/// filesystem root, so the caller still gets an absolute path.
pub fn canonical_root(root: &Path) -> PathBuf {
    match std::fs::canonicalize(root) {
        Ok(canonical) => canonical,
        Err(e) => {
            warn!(
                "cannot canonicalize '{}' ({}); resolving paths from the filesystem root",
                root.display(),
                e
            );
            PathBuf::from(std::path::MAIN_SEPARATOR_STR)
        }
    }
}

/// Join a `/`-separated repository-relative path onto a root returned by
/// [`canonical_root`].
pub fn resolve_absolute(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in relative.split('/').filter(|c| !c.is_empty()) {
        path.push(component);
    }
    path
}
