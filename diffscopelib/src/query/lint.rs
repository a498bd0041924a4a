//! Filter for style-checker violations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::edit::Edit;
use crate::data::entry::DiffEntry;

use super::span::{BoundaryPolicy, SpanMatcher};

/// The check that reported a violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckKind {
    #[default]
    General,
    /// Blank-line separator checks report on the line after the changed
    /// block, so that line is in scope as well.
    BlankLineSeparator,
}

/// Accepts single-line violations that fall inside changed lines.
///
/// Files are keyed by their absolute new path, as style checkers report them.
#[derive(Debug, Clone, Default)]
pub struct LintFilter {
    edits: HashMap<PathBuf, Vec<Edit>>,
}

const MATCHER: SpanMatcher = SpanMatcher::new(BoundaryPolicy::LINT);

impl LintFilter {
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

    /// Number of files with a diff entry.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Whether a violation on 1-based `line` of `file` is in scope.
    pub fn accept(&self, file: &Path, line: u32, check: CheckKind) -> bool {
        let Some(edits) = self.edits.get(file) else {
            return false;
        };
        MATCHER.matches_line(edits, line)
            || (check == CheckKind::BlankLineSeparator && MATCHER.is_adjacent(edits, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::entry::ChangeKind;

    fn filter_with(path: &str, edits: Vec<Edit>) -> (LintFilter, PathBuf) {
        let entry = DiffEntry::new(
            Path::new("/"),
            ChangeKind::Modify,
            Some(path.to_string()),
            Some(path.to_string()),
            edits,
        );
        let absolute = entry.absolute_new_path.clone().unwrap();
        (LintFilter::new(&[entry]), absolute)
    }

    #[test]
    fn test_accept_inside_edit() {
        let (filter, file) = filter_with("test", vec![Edit::new(5, 12, 5, 12)]);

        assert!(filter.accept(&file, 10, CheckKind::General));
        assert!(!filter.accept(&file, 5, CheckKind::General));
        assert!(filter.accept(&file, 12, CheckKind::General));
        assert!(!filter.accept(&file, 13, CheckKind::General));
    }

    #[test]
    fn test_blank_line_separator_accepts_next_line() {
        let (filter, file) = filter_with("test", vec![Edit::new(5, 9, 5, 9)]);

        assert!(filter.accept(&file, 10, CheckKind::BlankLineSeparator));
        assert!(!filter.accept(&file, 10, CheckKind::General));
        assert!(!filter.accept(&file, 11, CheckKind::BlankLineSeparator));
    }

    #[test]
    fn test_unknown_file_is_rejected() {
        let (filter, _) = filter_with("test", vec![Edit::new(0, 0, 0, 20)]);
        assert!(!filter.accept(Path::new("/other"), 3, CheckKind::General));
    }

    #[test]
    fn test_file_without_edits_is_rejected() {
        let (filter, file) = filter_with("test", Vec::new());
        assert!(!filter.accept(&file, 1, CheckKind::BlankLineSeparator));
    }

    #[test]
    fn test_no_entries() {
        let filter = LintFilter::new(&[]);
        assert!(filter.is_empty());
        assert!(!filter.accept(Path::new("/test"), 1, CheckKind::General));
    }
}
