//! Matching query lines against edit spans.
//!
//! Every filter asks the same question ("does this line range fall inside a
//! changed span?") but with different boundary rules. [`BoundaryPolicy`]
//! captures those rules; [`SpanMatcher`] applies one policy to an edit list.

use serde::{Deserialize, Serialize};

use crate::data::edit::{Edit, EditKind};

/// Whether an edit bound admits a query line equal to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bound {
    Open,
    Closed,
}

/// Boundary rules for matching a query against new-side edit spans.
///
/// Edit bounds are the 0-based half-open `[begin_b, end_b)`; query lines are
/// 1-based display lines, which is why the usual policies are open at the
/// begin and closed at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryPolicy {
    pub begin: Bound,
    pub end: Bound,
    /// Shift an edit's new span by one when its old span is exactly one line.
    pub shift_single_line: bool,
    /// Consult only the first edit of a file.
    pub first_edit_only: bool,
    /// Ignore edits that only delete lines.
    pub skip_deletions: bool,
}

impl BoundaryPolicy {
    /// `begin_b < L <= end_b`.
    pub const LINT: Self = Self {
        begin: Bound::Open,
        end: Bound::Closed,
        shift_single_line: false,
        first_edit_only: false,
        skip_deletions: false,
    };

    /// `begin_b + off <= begin && end_b + off >= end`, first edit only.
    pub const ANALYZER: Self = Self {
        begin: Bound::Closed,
        end: Bound::Closed,
        shift_single_line: true,
        first_edit_only: true,
        skip_deletions: false,
    };

    /// `begin_b < L <= end_b` over insertions and replacements.
    pub const COVERAGE: Self = Self {
        begin: Bound::Open,
        end: Bound::Closed,
        shift_single_line: false,
        first_edit_only: false,
        skip_deletions: true,
    };
}

/// Applies a [`BoundaryPolicy`] to edit lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanMatcher {
    policy: BoundaryPolicy,
}

impl SpanMatcher {
    pub const fn new(policy: BoundaryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    fn candidates<'a>(&self, edits: &'a [Edit]) -> impl Iterator<Item = &'a Edit> + 'a {
        let skip_deletions = self.policy.skip_deletions;
        let limit = if self.policy.first_edit_only { 1 } else { usize::MAX };
        edits
            .iter()
            .take(limit)
            .filter(move |edit| !(skip_deletions && edit.kind() == EditKind::Delete))
    }

    fn shifted(&self, edit: &Edit) -> (u64, u64) {
        let offset = u64::from(self.policy.shift_single_line && edit.begin_a + 1 == edit.end_a);
        (
            u64::from(edit.begin_b) + offset,
            u64::from(edit.end_b) + offset,
        )
    }

    fn contains(&self, edit: &Edit, begin: u32, end: u32) -> bool {
        let (edit_begin, edit_end) = self.shifted(edit);
        let (begin, end) = (u64::from(begin), u64::from(end));
        let after_begin = match self.policy.begin {
            Bound::Open => edit_begin < begin,
            Bound::Closed => edit_begin <= begin,
        };
        let before_end = match self.policy.end {
            Bound::Open => edit_end > end,
            Bound::Closed => edit_end >= end,
        };
        after_begin && before_end
    }

    /// Whether the inclusive line range `[begin, end]` lies inside some edit.
    pub fn matches_range(&self, edits: &[Edit], begin: u32, end: u32) -> bool {
        self.candidates(edits)
            .any(|edit| self.contains(edit, begin, end))
    }

    /// Whether `line` lies inside some edit.
    pub fn matches_line(&self, edits: &[Edit], line: u32) -> bool {
        self.matches_range(edits, line, line)
    }

    /// Whether `line` is the line right after some edit's new span.
    pub fn is_adjacent(&self, edits: &[Edit], line: u32) -> bool {
        self.candidates(edits)
            .any(|edit| u64::from(line) == u64::from(edit.end_b) + 1)
    }
}
