//! Content loading for diffing.
//!
//! A [`FileContent`] is the byte payload of one file at one location (a
//! committed blob, an index entry or the working tree), together with a
//! classification that decides whether it can be diffed line by line.
//! Oversized and binary payloads are never diffed; submodule links are
//! rendered as a single synthetic `Subproject commit <id>` line.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::DiffscopeError;
use crate::Result;

/// Default size above which content is treated as binary (10 MiB).
pub const DEFAULT_BIG_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// How many leading bytes are inspected for a NUL byte.
const BINARY_PROBE_LEN: usize = 8000;

/// Where a piece of content was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOrigin {
    /// A blob in a committed tree.
    Committed,
    /// An entry in the working index.
    Index,
    /// A file in the working tree.
    WorkingTree,
}

/// Classification of a piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentClass {
    /// Regular text, diffable line by line.
    Normal,
    /// No content on this side (added/deleted file).
    Missing,
    /// Binary or larger than the configured threshold.
    Binary,
    /// A submodule link pointing at the given commit.
    Submodule(gix::ObjectId),
}

/// What kind of tree or index entry a side of a diff refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular or executable file, or symlink.
    Blob,
    /// Submodule reference.
    Gitlink,
    /// The path does not exist on this side.
    Missing,
}

impl EntryKind {
    /// Classify a tree entry mode.
    pub fn from_tree_mode(mode: gix::object::tree::EntryMode) -> Option<Self> {
        if mode.is_commit() {
            Some(EntryKind::Gitlink)
        } else if mode.is_blob() || mode.is_link() {
            Some(EntryKind::Blob)
        } else {
            None
        }
    }
}

/// Immutable byte payload of one file at one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    origin: ContentOrigin,
    class: ContentClass,
    data: Vec<u8>,
}

impl FileContent {
    /// Content that does not exist on this side.
    pub fn missing(origin: ContentOrigin) -> Self {
        Self {
            origin,
            class: ContentClass::Missing,
            data: Vec::new(),
        }
    }

    /// Classify raw bytes against a size threshold.
    pub fn from_bytes(origin: ContentOrigin, data: Vec<u8>, big_file_threshold: u64) -> Self {
        if data.len() as u64 > big_file_threshold || looks_binary(&data) {
            return Self::binary(origin);
        }
        Self {
            origin,
            class: ContentClass::Normal,
            data,
        }
    }

    /// Oversized or binary content; the payload is dropped.
    pub fn binary(origin: ContentOrigin) -> Self {
        Self {
            origin,
            class: ContentClass::Binary,
            data: Vec::new(),
        }
    }

    /// A submodule link, rendered as `Subproject commit <id>`.
    ///
    /// A null id renders as empty content.
    pub fn submodule(origin: ContentOrigin, id: gix::ObjectId) -> Self {
        if id.is_null() {
            return Self::missing(origin);
        }
        Self {
            origin,
            class: ContentClass::Submodule(id),
            data: format!("Subproject commit {}\n", id).into_bytes(),
        }
    }

    pub fn origin(&self) -> ContentOrigin {
        self.origin
    }

    pub fn class(&self) -> &ContentClass {
        &self.class
    }

    /// Whether line-level edits can be computed from this content.
    pub fn is_diffable(&self) -> bool {
        !matches!(self.class, ContentClass::Binary)
    }

    /// The bytes fed to the line splitter. Missing and binary content is empty.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

fn looks_binary(data: &[u8]) -> bool {
    data.iter().take(BINARY_PROBE_LEN).any(|&b| b == 0)
}

/// Reads file content from a repository's object store, index and work tree.
pub struct ContentSource<'repo> {
    repo: &'repo gix::Repository,
    big_file_threshold: u64,
}

impl<'repo> ContentSource<'repo> {
    pub fn new(repo: &'repo gix::Repository, big_file_threshold: u64) -> Self {
        Self {
            repo,
            big_file_threshold,
        }
    }

    pub fn big_file_threshold(&self) -> u64 {
        self.big_file_threshold
    }

    /// Open one side of a diff entry.
    pub fn open(
        &self,
        kind: EntryKind,
        id: Option<gix::ObjectId>,
        origin: ContentOrigin,
    ) -> Result<FileContent> {
        match (kind, id) {
            (EntryKind::Missing, _) | (_, None) => Ok(FileContent::missing(origin)),
            (EntryKind::Gitlink, Some(id)) => Ok(FileContent::submodule(origin, id)),
            (EntryKind::Blob, Some(id)) => self.blob(id, origin),
        }
    }

    /// Load a blob, refusing to load it when it exceeds the size threshold.
    pub fn blob(&self, id: gix::ObjectId, origin: ContentOrigin) -> Result<FileContent> {
        let header = self.repo.find_header(id).map_err(|e| {
            debug!("header lookup for {} failed: {}", id, e);
            DiffscopeError::MissingObject { id: id.to_string() }
        })?;

        if header.size() > self.big_file_threshold {
            warn!(
                "object {} is {} bytes, above the {} byte threshold; treating as binary",
                id,
                header.size(),
                self.big_file_threshold
            );
            return Ok(FileContent::binary(origin));
        }

        let object = self
            .repo
            .find_object(id)
            .map_err(|_| DiffscopeError::MissingObject { id: id.to_string() })?;
        let blob = object
            .try_into_blob()
            .map_err(|_| DiffscopeError::GitError(format!("Object {} is not a blob", id)))?;

        Ok(FileContent::from_bytes(
            origin,
            blob.data.to_vec(),
            self.big_file_threshold,
        ))
    }

    /// Resolve an abbreviated hex id and load the blob it names.
    ///
    /// Zero matches is [`DiffscopeError::MissingObject`], more than one is
    /// [`DiffscopeError::AmbiguousObject`].
    pub fn open_abbreviated(&self, hex: &str, origin: ContentOrigin) -> Result<FileContent> {
        let id = self.resolve_abbreviated(hex)?;
        self.blob(id, origin)
    }

    /// Resolve an abbreviated hex id to a full object id.
    pub fn resolve_abbreviated(&self, hex: &str) -> Result<gix::ObjectId> {
        let prefix = gix::hash::Prefix::from_hex(hex)
            .map_err(|e| DiffscopeError::GitError(format!("Invalid object id '{}': {}", hex, e)))?;

        let mut candidates = HashSet::new();
        let outcome = self
            .repo
            .objects
            .lookup_prefix(prefix, Some(&mut candidates))
            .map_err(|e| DiffscopeError::GitError(format!("Failed to look up {}: {}", hex, e)))?;

        match outcome {
            Some(Ok(id)) => Ok(id),
            Some(Err(())) => Err(DiffscopeError::AmbiguousObject {
                id: hex.to_string(),
                candidates: candidates.len(),
            }),
            None => Err(DiffscopeError::MissingObject { id: hex.to_string() }),
        }
    }

    /// Read a file from the working tree. A file that does not exist is `Missing`.
    pub fn working_file(&self, relative: impl AsRef<Path>) -> Result<FileContent> {
        let Some(root) = self.repo.work_dir() else {
            return Err(DiffscopeError::GitError(
                "Repository has no work directory".to_string(),
            ));
        };
        let path: PathBuf = root.join(relative.as_ref());
        match std::fs::metadata(&path) {
            Ok(meta) if meta.len() > self.big_file_threshold => {
                return Ok(FileContent::binary(ContentOrigin::WorkingTree))
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(FileContent::missing(ContentOrigin::WorkingTree))
            }
            Err(e) => return Err(e.into()),
        }
        let data = std::fs::read(&path)?;
        Ok(FileContent::from_bytes(
            ContentOrigin::WorkingTree,
            data,
            self.big_file_threshold,
        ))
    }
}
