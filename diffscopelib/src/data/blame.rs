//! Per-line authorship.
//!
//! Blame starts at a revision and walks history through every parent. At each
//! commit the lines still unattributed are passed on unchanged to a parent
//! holding an identical blob, or remapped through the line diff against each
//! parent in turn. Lines no parent explains are attributed to the commit.
//! Renames and copies are followed through tree rewrite detection.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::DiffscopeError;
use crate::source::content::{ContentOrigin, ContentSource, EntryKind, DEFAULT_BIG_FILE_THRESHOLD};
use crate::source::revision::resolve_revision;
use crate::Result;

use super::diff::{compute_tree_changes, find_tree, open_repository, Side};
use super::edit::{split_lines, Edit, EditCalculator};
use super::entry::ChangeKind;

/// A person as recorded in a commit signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    /// `None` when the signature carries an empty email.
    pub email: Option<String>,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            name: name.into(),
            email: email.map(str::to_string),
        }
    }

    fn from_signature(signature: gix::actor::SignatureRef<'_>) -> Self {
        let email = signature.email.to_string();
        Self {
            name: signature.name.to_string(),
            email: (!email.is_empty()).then_some(email),
        }
    }
}

/// Attribution of one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameLine {
    /// Hex id of the commit that last touched the line.
    pub commit: String,
    pub author: Option<Identity>,
    pub committer: Option<Identity>,
    /// Path of the file in that commit (differs from the blamed path across renames).
    pub source_path: String,
    /// 0-based line number in that commit's version of the file.
    pub source_line: u32,
}

/// Blame of one file, indexed by 0-based line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameResult {
    pub path: String,
    pub lines: Vec<BlameLine>,
}

impl BlameResult {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, index: usize) -> Option<&BlameLine> {
        self.lines.get(index)
    }

    /// Author of the commit that last touched line `index`.
    pub fn source_author(&self, index: usize) -> Option<&Identity> {
        self.line(index).and_then(|line| line.author.as_ref())
    }

    /// Committer of the commit that last touched line `index`.
    pub fn source_committer(&self, index: usize) -> Option<&Identity> {
        self.line(index).and_then(|line| line.committer.as_ref())
    }
}

/// Commit metadata shared by all lines attributed to it.
#[derive(Debug, Clone)]
struct CommitInfo {
    hex: String,
    parents: Vec<gix::ObjectId>,
    tree: gix::ObjectId,
    author: Option<Identity>,
    committer: Option<Identity>,
}

/// A line still looking for its origin.
#[derive(Debug, Clone, Copy)]
struct Pending {
    /// Index in the blamed file.
    target: usize,
    /// Line number in the version currently being examined.
    current: u32,
}

/// A version of the blamed file in one commit, with the lines whose origin
/// is still being looked for in it.
struct Suspect {
    commit: gix::ObjectId,
    path: String,
    side: Side,
    content: Vec<u8>,
    lines: Vec<Pending>,
}

/// Queue `suspect`, merging it with a queued suspect for the same version.
fn enqueue(queue: &mut VecDeque<Suspect>, suspect: Suspect) {
    match queue
        .iter_mut()
        .find(|queued| queued.commit == suspect.commit && queued.path == suspect.path)
    {
        Some(queued) => queued.lines.extend(suspect.lines),
        None => queue.push_back(suspect),
    }
}

/// Computes blame for a batch of paths.
#[derive(Debug, Clone)]
pub struct BlameCalculator {
    edits: EditCalculator,
    big_file_threshold: u64,
}

impl Default for BlameCalculator {
    fn default() -> Self {
        Self {
            edits: EditCalculator::new(),
            big_file_threshold: DEFAULT_BIG_FILE_THRESHOLD,
        }
    }
}

impl BlameCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edit_calculator(mut self, edits: EditCalculator) -> Self {
        self.edits = edits;
        self
    }

    pub fn big_file_threshold(mut self, bytes: u64) -> Self {
        self.big_file_threshold = bytes;
        self
    }

    /// Blame every path in `paths` as of `start_rev`.
    ///
    /// Returns one result per input path, in input order. A path absent at
    /// `start_rev` yields a result with no lines. Fails as a whole when
    /// `start_rev` cannot be resolved.
    pub fn calculate(
        &self,
        repo_root: impl AsRef<Path>,
        paths: &[String],
        start_rev: &str,
    ) -> Result<Vec<BlameResult>> {
        let repo = open_repository(repo_root.as_ref())?;
        let start = resolve_revision(&repo, start_rev).map_err(|e| {
            error!("failed to resolve blame revision [{}]: {}", start_rev, e);
            e
        })?;

        let mut walker = BlameWalker {
            repo: &repo,
            source: ContentSource::new(&repo, self.big_file_threshold),
            edits: self.edits,
            commits: HashMap::new(),
        };

        let results = paths
            .iter()
            .map(|path| walker.blame_file(start.id(), path))
            .collect::<Result<Vec<_>>>()?;

        info!("blamed {} files at {}", results.len(), start);
        Ok(results)
    }
}

struct BlameWalker<'repo> {
    repo: &'repo gix::Repository,
    source: ContentSource<'repo>,
    edits: EditCalculator,
    commits: HashMap<gix::ObjectId, CommitInfo>,
}

impl<'repo> BlameWalker<'repo> {
    fn commit(&mut self, id: gix::ObjectId) -> Result<CommitInfo> {
        if let Some(info) = self.commits.get(&id) {
            return Ok(info.clone());
        }

        let commit = self
            .repo
            .find_commit(id)
            .map_err(|_| DiffscopeError::MissingObject { id: id.to_string() })?;
        let tree = commit
            .tree_id()
            .map_err(|e| DiffscopeError::GitError(format!("Failed to read tree of {}: {}", id, e)))?
            .detach();
        let info = CommitInfo {
            hex: id.to_string(),
            parents: commit.parent_ids().map(|p| p.detach()).collect(),
            tree,
            author: commit.author().ok().map(Identity::from_signature),
            committer: commit.committer().ok().map(Identity::from_signature),
        };
        self.commits.insert(id, info.clone());
        Ok(info)
    }

    fn lines_of(&self, side: Side) -> Result<Option<Vec<u8>>> {
        let content = self
            .source
            .open(side.kind, Some(side.id), ContentOrigin::Committed)?;
        Ok(content.is_diffable().then(|| content.bytes().to_vec()))
    }

    fn blame_file(&mut self, start: gix::ObjectId, path: &str) -> Result<BlameResult> {
        let start_info = self.commit(start)?;
        let Some(start_side) = entry_at(self.repo, start_info.tree, path)? else {
            warn!("{} does not exist at {}; nothing to blame", path, start);
            return Ok(BlameResult {
                path: path.to_string(),
                lines: Vec::new(),
            });
        };
        let Some(content) = self.lines_of(start_side)? else {
            warn!("{} is binary or oversized; nothing to blame", path);
            return Ok(BlameResult {
                path: path.to_string(),
                lines: Vec::new(),
            });
        };

        let line_count = split_lines(&content).len();
        let mut attributed: Vec<Option<BlameLine>> = vec![None; line_count];
        let mut queue = VecDeque::new();
        queue.push_back(Suspect {
            commit: start,
            path: path.to_string(),
            side: start_side,
            content,
            lines: (0..line_count)
                .map(|i| Pending {
                    target: i,
                    current: i as u32,
                })
                .collect(),
        });

        while let Some(suspect) = queue.pop_front() {
            self.examine(suspect, &mut queue, &mut attributed)?;
        }

        Ok(BlameResult {
            path: path.to_string(),
            lines: attributed.into_iter().flatten().collect(),
        })
    }

    /// Attribute the lines `suspect` introduced and hand the rest to its parents.
    ///
    /// Parents are tried in order; a line unchanged relative to an earlier
    /// parent is never offered to a later one.
    fn examine(
        &mut self,
        suspect: Suspect,
        queue: &mut VecDeque<Suspect>,
        attributed: &mut [Option<BlameLine>],
    ) -> Result<()> {
        let info = self.commit(suspect.commit)?;

        // Unchanged in some parent: the lines are older than this commit.
        for &parent in &info.parents {
            let parent_info = self.commit(parent)?;
            if let Some(side) = entry_at(self.repo, parent_info.tree, &suspect.path)? {
                if side.id == suspect.side.id {
                    enqueue(queue, Suspect { commit: parent, ..suspect });
                    return Ok(());
                }
            }
        }

        let mut remaining = suspect.lines;
        for &parent in &info.parents {
            if remaining.is_empty() {
                break;
            }
            let Some((parent_path, parent_side)) =
                self.origin_in_parent(&info, parent, &suspect.path)?
            else {
                continue;
            };
            let Some(parent_content) = self.lines_of(parent_side)? else {
                continue;
            };

            let edits = self.edits.compute_edits(&parent_content, &suspect.content);
            let (changed, unchanged): (Vec<Pending>, Vec<Pending>) =
                remaining.into_iter().partition(|line| {
                    edits
                        .iter()
                        .any(|e| e.begin_b <= line.current && line.current < e.end_b)
                });
            remaining = changed;
            if unchanged.is_empty() {
                continue;
            }

            enqueue(
                queue,
                Suspect {
                    commit: parent,
                    path: parent_path,
                    side: parent_side,
                    content: parent_content,
                    lines: unchanged
                        .into_iter()
                        .map(|line| Pending {
                            target: line.target,
                            current: map_to_parent(&edits, line.current),
                        })
                        .collect(),
                },
            );
        }

        if !remaining.is_empty() {
            if info.parents.is_empty() {
                debug!("{} reaches root commit {}", suspect.path, info.hex);
            } else {
                debug!(
                    "{} lines of {} introduced by {}",
                    remaining.len(),
                    suspect.path,
                    info.hex
                );
            }
            attribute(attributed, &remaining, &info, &suspect.path);
        }
        Ok(())
    }

    /// Locate the content of `path` in `parent`, following renames and copies.
    fn origin_in_parent(
        &mut self,
        info: &CommitInfo,
        parent: gix::ObjectId,
        path: &str,
    ) -> Result<Option<(String, Side)>> {
        let parent_info = self.commit(parent)?;
        if let Some(side) = entry_at(self.repo, parent_info.tree, path)? {
            return Ok(Some((path.to_string(), side)));
        }

        let parent_tree = find_tree(self.repo, parent_info.tree)?;
        let tree = find_tree(self.repo, info.tree)?;
        let origin = compute_tree_changes(&parent_tree, &tree)?
            .into_iter()
            .find(|change| {
                matches!(change.change, ChangeKind::Rename | ChangeKind::Copy)
                    && change.new_path.as_deref() == Some(path)
            })
            .and_then(|change| Some((change.old_path?, change.old?)));

        if let Some((old_path, _)) = &origin {
            debug!("{} was {} before {}", path, old_path, info.hex);
        }
        Ok(origin)
    }
}

/// Attribute `lines` of `path` to `info`.
fn attribute(attributed: &mut [Option<BlameLine>], lines: &[Pending], info: &CommitInfo, path: &str) {
    for line in lines {
        attributed[line.target] = Some(BlameLine {
            commit: info.hex.clone(),
            author: info.author.clone(),
            committer: info.committer.clone(),
            source_path: path.to_string(),
            source_line: line.current,
        });
    }
}

/// Map an unchanged new-side line to its old-side number.
fn map_to_parent(edits: &[Edit], line: u32) -> u32 {
    let mut shift: i64 = 0;
    for edit in edits {
        if edit.end_b > line {
            break;
        }
        shift += i64::from(edit.length_a()) - i64::from(edit.length_b());
    }
    (i64::from(line) + shift).max(0) as u32
}

/// Look up a `/`-separated path in a tree.
fn entry_at(repo: &gix::Repository, tree_id: gix::ObjectId, path: &str) -> Result<Option<Side>> {
    let mut tree = find_tree(repo, tree_id)?;
    let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();

    while let Some(component) = components.next() {
        let mut found = None;
        for entry in tree.iter() {
            let entry = entry
                .map_err(|e| DiffscopeError::GitError(format!("Failed to read tree entry: {}", e)))?;
            if entry.filename() == component {
                found = Some((entry.mode(), entry.oid().to_owned()));
                break;
            }
        }
        let Some((mode, id)) = found else {
            return Ok(None);
        };

        if components.peek().is_none() {
            return Ok(EntryKind::from_tree_mode(mode).map(|kind| Side { id, kind }));
        }
        if !mode.is_tree() {
            return Ok(None);
        }
        tree = find_tree(repo, id)?;
    }
    Ok(None)
}
