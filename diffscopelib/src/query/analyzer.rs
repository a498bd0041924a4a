//! Filter for static-analyzer violations.
//!
//! Violations may span several lines. A violation is in scope when its whole
//! range lies inside the file's first edit; a replacement of exactly one old
//! line shifts that edit down by one line before the comparison.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::data::edit::Edit;
use crate::data::entry::DiffEntry;

use super::span::{BoundaryPolicy, SpanMatcher};

const MATCHER: SpanMatcher = SpanMatcher::new(BoundaryPolicy::ANALYZER);

/// Accepts line-range violations that fall inside changed lines.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerFilter {
    edits: HashMap<PathBuf, Vec<Edit>>,
}

impl AnalyzerFilter {
    pub fn new(entries: &[DiffEntry]) -> Self {
        let edits = entries
            .iter()
            .filter_map(|entry| {
                entry
                    .absolute_new_path
                    .clone()
                    .map(|path| (path, entry.edits.clone()))
            })
            .collect();
        Self { edits }
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Whether a violation spanning `begin_line..=end_line` of `file` is in scope.
    pub fn accept(&self, file: &Path, begin_line: u32, end_line: u32) -> bool {
        self.edits
            .get(file)
            .is_some_and(|edits| MATCHER.matches_range(edits, begin_line, end_line))
    }
}
