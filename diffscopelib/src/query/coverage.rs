//! Instruction-level filtering for coverage instrumentation.
//!
//! A method body is a flat list of instructions, some of which are line
//! markers. Each marker starts a span that runs to the next marker; a filter
//! decides per span whether it stays measured or is reported to an
//! [`IgnoreSink`]. Filters implement [`InstructionFilter`] and are composed
//! in a [`FilterChain`] handed to the instrumentation pass.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::data::edit::Edit;
use crate::data::entry::DiffEntry;

use super::paths::{SourceKey, SourceLayout};
use super::span::{BoundaryPolicy, SpanMatcher};

/// One instruction of a compiled method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insn {
    /// Marks the start of the code for a 1-based source line.
    LineMarker(u32),
    Other,
}

/// Instructions from a line marker up to the next marker, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionSpan {
    pub line: u32,
    /// Index of the marker.
    pub start: usize,
    /// Index of the next marker, or of the last instruction.
    pub end: usize,
}

/// Collect the marker spans of a method body.
///
/// Markers are taken from every instruction except the last one.
pub fn collect_spans(instructions: &[Insn]) -> Vec<InstructionSpan> {
    let Some(last) = instructions.len().checked_sub(1) else {
        return Vec::new();
    };

    let mut spans: Vec<InstructionSpan> = Vec::new();
    for (index, insn) in instructions[..last].iter().enumerate() {
        if let Insn::LineMarker(line) = *insn {
            if let Some(previous) = spans.last_mut() {
                previous.end = index;
            }
            spans.push(InstructionSpan {
                line,
                start: index,
                end: last,
            });
        }
    }
    spans
}

/// Receives instruction ranges that should not be measured.
pub trait IgnoreSink {
    /// Ignore instructions `from..=to`.
    fn ignore(&mut self, from: usize, to: usize);
}

impl IgnoreSink for Vec<(usize, usize)> {
    fn ignore(&mut self, from: usize, to: usize) {
        self.push((from, to));
    }
}

/// A filter over one method body.
///
/// Filters are built once and then queried from any number of threads.
pub trait InstructionFilter: Send + Sync {
    fn filter(&self, key: &SourceKey, instructions: &[Insn], sink: &mut dyn IgnoreSink);
}

/// Ignore a whole method body.
pub(crate) fn ignore_all(instructions: &[Insn], sink: &mut dyn IgnoreSink) {
    if let Some(last) = instructions.len().checked_sub(1) {
        sink.ignore(0, last);
    }
}

/// Ignore every span for which `include` is false.
pub(crate) fn ignore_spans_except(
    instructions: &[Insn],
    sink: &mut dyn IgnoreSink,
    include: impl Fn(u32) -> bool,
) {
    for span in collect_spans(instructions) {
        if !include(span.line) {
            sink.ignore(span.start, span.end);
        }
    }
}

/// An ordered list of filters applied to each method.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn InstructionFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter.
    pub fn with(mut self, filter: Arc<dyn InstructionFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: Arc<dyn InstructionFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl InstructionFilter for FilterChain {
    fn filter(&self, key: &SourceKey, instructions: &[Insn], sink: &mut dyn IgnoreSink) {
        for filter in &self.filters {
            filter.filter(key, instructions, sink);
        }
    }
}

const MATCHER: SpanMatcher = SpanMatcher::new(BoundaryPolicy::COVERAGE);

/// Keeps only spans whose line was inserted or replaced.
///
/// Methods of files without a diff entry are ignored entirely.
#[derive(Debug, Clone, Default)]
pub struct CoverageFilter {
    edits: HashMap<SourceKey, Vec<Edit>>,
}

impl CoverageFilter {
    pub fn new(entries: &[DiffEntry], layout: &SourceLayout) -> Self {
        let mut edits = HashMap::new();
        for entry in entries {
            let Some(key) = entry
                .absolute_new_path
                .as_deref()
                .and_then(|path| layout.key_for(path))
            else {
                debug!("{} is outside the source layout", entry.path());
                continue;
            };
            edits.insert(key, entry.edits.clone());
        }
        Self { edits }
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edits_for(&self, key: &SourceKey) -> Option<&[Edit]> {
        self.edits.get(key).map(Vec::as_slice)
    }
}

impl InstructionFilter for CoverageFilter {
    fn filter(&self, key: &SourceKey, instructions: &[Insn], sink: &mut dyn IgnoreSink) {
        match self.edits.get(key) {
            None => ignore_all(instructions, sink),
            Some(edits) => {
                ignore_spans_except(instructions, sink, |line| MATCHER.matches_line(edits, line))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::entry::{canonical_root, ChangeKind};
    use tempfile::tempdir;

    use super::Insn::{LineMarker, Other};

    fn method() -> Vec<Insn> {
        vec![
            LineMarker(5),
            Other,
            LineMarker(6),
            Other,
            Other,
            LineMarker(7),
            Other,
            LineMarker(8),
            Other,
        ]
    }

    fn entry(root: &std::path::Path, path: &str, edits: Vec<Edit>) -> DiffEntry {
        DiffEntry::new(
            &canonical_root(root),
            ChangeKind::Modify,
            Some(path.to_string()),
            Some(path.to_string()),
            edits,
        )
    }

    #[test]
    fn test_collect_spans() {
        let spans = collect_spans(&method());
        assert_eq!(
            spans,
            vec![
                InstructionSpan { line: 5, start: 0, end: 2 },
                InstructionSpan { line: 6, start: 2, end: 5 },
                InstructionSpan { line: 7, start: 5, end: 7 },
                InstructionSpan { line: 8, start: 7, end: 8 },
            ]
        );
    }

    #[test]
    fn test_marker_on_last_instruction_is_skipped() {
        let spans = collect_spans(&[LineMarker(1), Other, LineMarker(2)]);
        assert_eq!(spans, vec![InstructionSpan { line: 1, start: 0, end: 2 }]);
        assert!(collect_spans(&[]).is_empty());
        assert!(collect_spans(&[Other, Other]).is_empty());
    }

    #[test]
    fn test_insert_keeps_only_its_lines() {
        let temp = tempdir().unwrap();
        let layout = SourceLayout::new(temp.path());
        let entries = [entry(temp.path(), "src/main/java/a/A.java", vec![Edit::new(6, 6, 6, 7)])];
        let filter = CoverageFilter::new(&entries, &layout);

        let mut ignored: Vec<(usize, usize)> = Vec::new();
        filter.filter(&SourceKey::from("a/A.java"), &method(), &mut ignored);
        assert_eq!(ignored, vec![(0, 2), (2, 5), (7, 8)]);
    }

    #[test]
    fn test_deletions_do_not_include_lines() {
        let temp = tempdir().unwrap();
        let layout = SourceLayout::new(temp.path());
        let entries = [entry(
            temp.path(),
            "src/main/java/a/A.java",
            vec![Edit::new(4, 6, 4, 4), Edit::new(7, 8, 6, 8)],
        )];
        let filter = CoverageFilter::new(&entries, &layout);

        let mut ignored: Vec<(usize, usize)> = Vec::new();
        filter.filter(&SourceKey::from("a/A.java"), &method(), &mut ignored);
        assert_eq!(ignored, vec![(0, 2), (2, 5)]);
    }

    #[test]
    fn test_file_without_entry_is_ignored_entirely() {
        let temp = tempdir().unwrap();
        let layout = SourceLayout::new(temp.path());
        let filter = CoverageFilter::new(&[], &layout);
        assert!(filter.is_empty());

        let mut ignored: Vec<(usize, usize)> = Vec::new();
        filter.filter(&SourceKey::from("a/A.java"), &method(), &mut ignored);
        assert_eq!(ignored, vec![(0, 8)]);
    }

    #[test]
    fn test_entries_outside_layout_are_dropped() {
        let temp = tempdir().unwrap();
        let layout = SourceLayout::new(temp.path());
        let entries = [entry(temp.path(), "README.md", vec![Edit::new(0, 0, 0, 1)])];
        let filter = CoverageFilter::new(&entries, &layout);
        assert!(filter.is_empty());
    }

    #[test]
    fn test_chain_applies_every_filter() {
        struct IgnoreFirst;
        impl InstructionFilter for IgnoreFirst {
            fn filter(&self, _: &SourceKey, _: &[Insn], sink: &mut dyn IgnoreSink) {
                sink.ignore(0, 0);
            }
        }

        let chain = FilterChain::new()
            .with(Arc::new(IgnoreFirst))
            .with(Arc::new(IgnoreFirst));
        assert_eq!(chain.len(), 2);

        let mut ignored: Vec<(usize, usize)> = Vec::new();
        chain.filter(&SourceKey::from("x"), &method(), &mut ignored);
        assert_eq!(ignored, vec![(0, 0), (0, 0)]);
    }

    #[test]
    fn test_filters_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CoverageFilter>();
        assert_send_sync::<FilterChain>();
    }
}
