//! Line-level edits between two versions of a file.
//!
//! Content is split into lines, optionally normalized for whitespace, and
//! handed to the blob diff primitive that ships with gitoxide. Only the
//! changed spans are kept, as half-open, 0-based line ranges on both sides.

use std::borrow::Cow;
use std::ops::Range;
use std::str::FromStr;

use gix::diff::blob::intern::{InternedInput, TokenSource};
use serde::{Deserialize, Serialize};

use crate::source::FileContent;

/// Kind of a single edit, derived from its spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditKind {
    /// Lines added on the new side: `begin_a == end_a`, `begin_b < end_b`.
    Insert,
    /// Lines removed from the old side: `begin_a < end_a`, `begin_b == end_b`.
    Delete,
    /// Lines changed: both spans non-empty.
    Replace,
    /// Both spans empty. Never produced by [`EditCalculator`].
    Empty,
}

/// One contiguous change between old lines `[begin_a, end_a)` and new
/// lines `[begin_b, end_b)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edit {
    pub begin_a: u32,
    pub end_a: u32,
    pub begin_b: u32,
    pub end_b: u32,
}

impl Edit {
    pub fn new(begin_a: u32, end_a: u32, begin_b: u32, end_b: u32) -> Self {
        Self {
            begin_a,
            end_a,
            begin_b,
            end_b,
        }
    }

    pub fn kind(&self) -> EditKind {
        match (self.begin_a < self.end_a, self.begin_b < self.end_b) {
            (false, true) => EditKind::Insert,
            (true, false) => EditKind::Delete,
            (true, true) => EditKind::Replace,
            (false, false) => EditKind::Empty,
        }
    }

    /// Number of old lines covered.
    pub fn length_a(&self) -> u32 {
        self.end_a - self.begin_a
    }

    /// Number of new lines covered.
    pub fn length_b(&self) -> u32 {
        self.end_b - self.begin_b
    }
}

/// How two lines are compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineComparison {
    /// Byte-for-byte (the line terminator is not part of the line).
    #[default]
    Exact,
    /// Ignore every whitespace byte.
    IgnoreAllWhitespace,
    /// Ignore whitespace at the start of the line.
    IgnoreLeadingWhitespace,
    /// Ignore whitespace at the end of the line.
    IgnoreTrailingWhitespace,
    /// Treat runs of whitespace as a single space and ignore trailing whitespace.
    IgnoreWhitespaceChange,
}

impl LineComparison {
    fn normalize<'a>(&self, line: &'a [u8]) -> Cow<'a, [u8]> {
        match self {
            LineComparison::Exact => Cow::Borrowed(line),
            LineComparison::IgnoreAllWhitespace => {
                if line.iter().any(u8::is_ascii_whitespace) {
                    Cow::Owned(
                        line.iter()
                            .copied()
                            .filter(|b| !b.is_ascii_whitespace())
                            .collect(),
                    )
                } else {
                    Cow::Borrowed(line)
                }
            }
            LineComparison::IgnoreLeadingWhitespace => {
                let start = line
                    .iter()
                    .position(|b| !b.is_ascii_whitespace())
                    .unwrap_or(line.len());
                Cow::Borrowed(&line[start..])
            }
            LineComparison::IgnoreTrailingWhitespace => Cow::Borrowed(trim_end(line)),
            LineComparison::IgnoreWhitespaceChange => {
                let trimmed = trim_end(line);
                let mut out = Vec::with_capacity(trimmed.len());
                let mut in_space = false;
                for &b in trimmed {
                    if b.is_ascii_whitespace() {
                        if !in_space {
                            out.push(b' ');
                        }
                        in_space = true;
                    } else {
                        out.push(b);
                        in_space = false;
                    }
                }
                Cow::Owned(out)
            }
        }
    }
}

impl FromStr for LineComparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" | "default" => Ok(LineComparison::Exact),
            "ignore-all-space" | "all" => Ok(LineComparison::IgnoreAllWhitespace),
            "ignore-leading-space" | "leading" => Ok(LineComparison::IgnoreLeadingWhitespace),
            "ignore-trailing-space" | "trailing" => Ok(LineComparison::IgnoreTrailingWhitespace),
            "ignore-space-change" | "change" => Ok(LineComparison::IgnoreWhitespaceChange),
            _ => Err(format!("Unknown line comparison: {}", s)),
        }
    }
}

fn trim_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &line[..end]
}

/// Line diff algorithm used by the primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiffAlgorithm {
    #[default]
    Histogram,
    Myers,
    MyersMinimal,
}

impl DiffAlgorithm {
    fn primitive(self) -> gix::diff::blob::Algorithm {
        match self {
            DiffAlgorithm::Histogram => gix::diff::blob::Algorithm::Histogram,
            DiffAlgorithm::Myers => gix::diff::blob::Algorithm::Myers,
            DiffAlgorithm::MyersMinimal => gix::diff::blob::Algorithm::MyersMinimal,
        }
    }
}

impl FromStr for DiffAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "histogram" => Ok(DiffAlgorithm::Histogram),
            "myers" => Ok(DiffAlgorithm::Myers),
            "myers-minimal" | "minimal" => Ok(DiffAlgorithm::MyersMinimal),
            _ => Err(format!("Unknown diff algorithm: {}", s)),
        }
    }
}

/// Split content into lines without their `\n` terminator.
///
/// A final line without terminator is a line like any other, so `"a\nb"`
/// and `"a\nb\n"` both have two lines.
pub fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    if content.is_empty() {
        return Vec::new();
    }
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    body.split(|&b| b == b'\n').collect()
}

/// Normalized line sequence handed to the interner.
struct LineSequence<'a> {
    lines: Vec<Cow<'a, [u8]>>,
}

impl<'a> LineSequence<'a> {
    fn new(content: &'a [u8], comparison: LineComparison) -> Self {
        Self {
            lines: split_lines(content)
                .into_iter()
                .map(|line| comparison.normalize(line))
                .collect(),
        }
    }
}

fn as_slice<'b>(line: &'b Cow<'_, [u8]>) -> &'b [u8] {
    line
}

impl<'b, 'a> TokenSource for &'b LineSequence<'a> {
    type Token = &'b [u8];
    type Tokenizer = std::iter::Map<
        std::slice::Iter<'b, Cow<'a, [u8]>>,
        fn(&'b Cow<'a, [u8]>) -> &'b [u8],
    >;

    fn tokenize(&self) -> Self::Tokenizer {
        let sequence: &'b LineSequence<'a> = *self;
        sequence
            .lines
            .iter()
            .map(as_slice as fn(&'b Cow<'a, [u8]>) -> &'b [u8])
    }

    fn estimate_tokens(&self) -> u32 {
        self.lines.len() as u32
    }
}

/// Computes ordered edit lists between two contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditCalculator {
    algorithm: DiffAlgorithm,
    comparison: LineComparison,
}

impl EditCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn algorithm(mut self, algorithm: DiffAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn comparison(mut self, comparison: LineComparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Edits between two raw contents, in ascending order.
    pub fn compute_edits(&self, old: &[u8], new: &[u8]) -> Vec<Edit> {
        if old == new {
            return Vec::new();
        }

        let before = LineSequence::new(old, self.comparison);
        let after = LineSequence::new(new, self.comparison);
        let input = InternedInput::new(&before, &after);

        let mut edits: Vec<Edit> = Vec::new();
        gix::diff::blob::diff(
            self.algorithm.primitive(),
            &input,
            |a: Range<u32>, b: Range<u32>| push_coalesced(&mut edits, a, b),
        );
        edits
    }

    /// Edits between two classified contents.
    ///
    /// Binary or oversized content on either side yields no edits.
    pub fn compute_content_edits(&self, old: &FileContent, new: &FileContent) -> Vec<Edit> {
        if !old.is_diffable() || !new.is_diffable() {
            return Vec::new();
        }
        self.compute_edits(old.bytes(), new.bytes())
    }
}

/// Append a hunk, merging it into the previous one when they touch on both sides.
fn push_coalesced(edits: &mut Vec<Edit>, a: Range<u32>, b: Range<u32>) {
    if a.is_empty() && b.is_empty() {
        return;
    }
    if let Some(last) = edits.last_mut() {
        if last.end_a == a.start && last.end_b == b.start {
            last.end_a = a.end;
            last.end_b = b.end;
            return;
        }
    }
    edits.push(Edit::new(a.start, a.end, b.start, b.end));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ContentOrigin;

    fn edits(old: &str, new: &str) -> Vec<Edit> {
        EditCalculator::new().compute_edits(old.as_bytes(), new.as_bytes())
    }

    fn assert_ordered(edits: &[Edit]) {
        for pair in edits.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            assert!(prev.end_a <= next.begin_a && prev.end_b <= next.begin_b);
            assert!(prev.end_a < next.begin_a || prev.end_b < next.begin_b);
        }
    }

    #[test]
    fn test_split_lines() {
        assert!(split_lines(b"").is_empty());
        assert_eq!(split_lines(b"a"), vec![b"a".as_slice()]);
        assert_eq!(split_lines(b"a\nb\n"), vec![b"a".as_slice(), b"b".as_slice()]);
        assert_eq!(split_lines(b"a\n\n"), vec![b"a".as_slice(), b"".as_slice()]);
        assert_eq!(split_lines(b"\n"), vec![b"".as_slice()]);
    }

    #[test]
    fn test_identical_content_has_no_edits() {
        assert!(edits("", "").is_empty());
        assert!(edits("a\nb\nc\n", "a\nb\nc\n").is_empty());
    }

    #[test]
    fn test_missing_final_newline_is_not_an_edit() {
        assert!(edits("a\nb\n", "a\nb").is_empty());
    }

    #[test]
    fn test_append_is_single_insert() {
        let result = edits("a\nb\nc\n", "a\nb\nc\nd\ne\n");
        assert_eq!(result, vec![Edit::new(3, 3, 3, 5)]);
        assert_eq!(result[0].kind(), EditKind::Insert);
    }

    #[test]
    fn test_removal_is_single_delete() {
        let result = edits("a\nb\nc\nd\n", "a\nd\n");
        assert_eq!(result, vec![Edit::new(1, 3, 1, 1)]);
        assert_eq!(result[0].kind(), EditKind::Delete);
        assert_eq!(result[0].begin_b, result[0].end_b);
    }

    #[test]
    fn test_replace_then_append() {
        let old = "first line\nsecond line\nthird line\n";
        let new = "first line\nsecond line changed\nthird line\nfourth line";
        let result = edits(old, new);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].kind(), EditKind::Replace);
        assert_eq!((result[0].begin_b, result[0].end_b), (1, 2));
        assert_eq!(result[1].kind(), EditKind::Insert);
        assert_eq!((result[1].begin_b, result[1].end_b), (3, 4));
        assert_ordered(&result);
    }

    #[test]
    fn test_insert_into_middle() {
        let result = edits("a\nb\nc\n", "a\nb\nx\ny\nc\n");
        assert_eq!(result, vec![Edit::new(2, 2, 2, 4)]);
    }

    #[test]
    fn test_add_from_empty_and_delete_to_empty() {
        assert_eq!(edits("", "a\nb\n"), vec![Edit::new(0, 0, 0, 2)]);
        assert_eq!(edits("a\nb\n", ""), vec![Edit::new(0, 2, 0, 0)]);
    }

    #[test]
    fn test_many_scattered_edits_are_ordered() {
        let old: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let new: String = (0..50)
            .filter(|i| i % 7 != 3)
            .map(|i| {
                if i % 5 == 0 {
                    format!("changed {i}\n")
                } else {
                    format!("line {i}\n")
                }
            })
            .collect();
        let result = edits(&old, &new);
        assert!(!result.is_empty());
        assert_ordered(&result);
        assert!(result.iter().all(|e| e.kind() != EditKind::Empty));
    }

    #[test]
    fn test_whitespace_modes() {
        let old = b"fn main() {\n    call();\n}\n";
        let new = b"fn main() {\n\tcall();  \n}\n";

        let exact = EditCalculator::new().compute_edits(old, new);
        assert_eq!(exact, vec![Edit::new(1, 2, 1, 2)]);

        let all = EditCalculator::new()
            .comparison(LineComparison::IgnoreAllWhitespace)
            .compute_edits(old, new);
        assert!(all.is_empty());

        let leading = EditCalculator::new()
            .comparison(LineComparison::IgnoreLeadingWhitespace)
            .compute_edits(old, new);
        assert_eq!(leading.len(), 1);

        let change = EditCalculator::new()
            .comparison(LineComparison::IgnoreWhitespaceChange)
            .compute_edits(b"a  b\n", b"a b   \n");
        assert!(change.is_empty());

        let trailing = EditCalculator::new()
            .comparison(LineComparison::IgnoreTrailingWhitespace)
            .compute_edits(b"x\r\n", b"x\n");
        assert!(trailing.is_empty());
    }

    #[test]
    fn test_algorithms_agree_on_simple_change() {
        for algorithm in [
            DiffAlgorithm::Histogram,
            DiffAlgorithm::Myers,
            DiffAlgorithm::MyersMinimal,
        ] {
            let result = EditCalculator::new()
                .algorithm(algorithm)
                .compute_edits(b"a\nb\nc\n", b"a\nB\nc\n");
            assert_eq!(result, vec![Edit::new(1, 2, 1, 2)], "{algorithm:?}");
        }
    }

    #[test]
    fn test_binary_side_yields_no_edits() {
        let old = FileContent::from_bytes(ContentOrigin::Committed, b"a\n".to_vec(), 1024);
        let new = FileContent::binary(ContentOrigin::Committed);
        assert!(EditCalculator::new()
            .compute_content_edits(&old, &new)
            .is_empty());

        let missing = FileContent::missing(ContentOrigin::Committed);
        assert_eq!(
            EditCalculator::new().compute_content_edits(&missing, &old),
            vec![Edit::new(0, 0, 0, 1)]
        );
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("Myers".parse::<DiffAlgorithm>(), Ok(DiffAlgorithm::Myers));
        assert_eq!(
            "ignore-space-change".parse::<LineComparison>(),
            Ok(LineComparison::IgnoreWhitespaceChange)
        );
        assert!("patience".parse::<DiffAlgorithm>().is_err());
    }

    #[test]
    fn test_edit_kinds() {
        assert_eq!(Edit::new(6, 6, 6, 7).kind(), EditKind::Insert);
        assert_eq!(Edit::new(6, 8, 6, 6).kind(), EditKind::Delete);
        assert_eq!(Edit::new(6, 7, 6, 8).kind(), EditKind::Replace);
        assert_eq!(Edit::new(3, 3, 3, 3).kind(), EditKind::Empty);
        assert_eq!(Edit::new(6, 7, 6, 8).length_a(), 1);
        assert_eq!(Edit::new(6, 7, 6, 8).length_b(), 2);
    }
}
