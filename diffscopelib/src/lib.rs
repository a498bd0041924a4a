//! # diffscopelib
//!
//! Computes which lines changed between two git revisions and answers
//! "is this finding inside the change?" for code-quality tools.
//!
//! ## Overview
//!
//! Style checkers, static analyzers and coverage tools report on a whole
//! codebase. When reviewing a change, only the lines the change touched
//! matter. This library turns a pair of revisions into a list of changed
//! files with line-level edits, and builds filters over that list:
//!
//! - **Lint filter**: single-line violations, with a relaxed boundary for
//!   blank-line separator checks
//! - **Analyzer filter**: line-range violations
//! - **Coverage filter**: instruction spans of inserted or replaced lines
//! - **Authorship filter**: instruction spans last touched by a given author
//!   or committer, based on blame
//!
//! ## Features
//!
//! - **Rename and copy detection** between commits
//! - **Staged changes**: index content wins over the committed new revision
//! - **Merge base**: `against` a branch, or `A...B` revision expressions
//! - **Binary and oversized files** are reported without line edits
//! - **Pure data types**: entries and blame results are plain owned values
//!
//! ## Example
//!
//! ```rust,ignore
//! use diffscopelib::{prepare, CheckKind, DiffConfig, SetupGuard};
//!
//! static GUARD: SetupGuard = SetupGuard::new();
//!
//! let config = DiffConfig::new().against("main");
//! if let Some(scope) = prepare(".", &config, &GUARD)? {
//!     let lint = scope.lint_filter();
//!     let file = scope.repo_root().join("src/lib.rs");
//!     println!("{}", lint.accept(&file, 42, CheckKind::General));
//! }
//! ```

pub mod data;
pub mod error;
pub mod options;
pub mod query;
pub mod setup;
pub mod source;

#[cfg(test)]
mod testutil;

pub use data::{
    calculate_merge_base, BlameCalculator, BlameLine, BlameResult, ChangeKind, DiffAlgorithm,
    DiffCalculator, DiffEntry, Edit, EditCalculator, EditKind, Identity, LineComparison,
};
pub use error::DiffscopeError;
pub use options::{DiffConfig, FailurePolicy};
pub use query::{
    AnalyzerFilter, AuthorshipFilter, CheckKind, CoverageFilter, FilterChain, IgnoreSink, Insn,
    InstructionFilter, LintFilter, PersonKind, PersonQuery, SourceKey, SourceLayout,
};
pub use setup::{prepare, DiffScope, SetupGuard};
pub use source::{resolve_revision, FilterConfig, Revision};

/// Result type for diffscopelib operations
pub type Result<T> = std::result::Result<T, DiffscopeError>;
