//! Error types for diffscopelib

use thiserror::Error;

/// Errors that can occur while computing diffs, blame or merge bases
#[derive(Error, Debug)]
pub enum DiffscopeError {
    /// A revision expression could not be resolved to a commit
    #[error("failed to resolve revision '{spec}': {message}")]
    UnresolvedRevision { spec: String, message: String },

    /// No object matches the (possibly abbreviated) id
    #[error("object {id} not found")]
    MissingObject { id: String },

    /// An abbreviated id matches more than one object
    #[error("abbreviated object id {id} is ambiguous ({candidates} candidates)")]
    AmbiguousObject { id: String, candidates: usize },

    /// Invalid glob pattern
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// Inconsistent configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Git operation error
    #[error("git error: {0}")]
    GitError(String),
}

impl DiffscopeError {
    /// Whether this error aborts a whole diff/blame request rather than a single file.
    pub fn is_fatal_to_request(&self) -> bool {
        matches!(
            self,
            DiffscopeError::UnresolvedRevision { .. } | DiffscopeError::InvalidConfig(_)
        )
    }
}
