//! Line-range filters: is a finding inside a changed region?
//!
//! This module handles the third stage of the pipeline - answering queries
//! from style checkers, static analyzers and coverage instrumentation
//! against the computed diff. It provides:
//!
//! - **Span matching**: one matcher, parameterized by `BoundaryPolicy`
//! - **Lint filter**: single-line violations, with the blank-line separator rule
//! - **Analyzer filter**: line-range violations against the first edit of a file
//! - **Coverage filter**: ignore instruction spans outside inserted/replaced lines
//! - **Authorship filter**: ignore instruction spans not last touched by a person
//!
//! All filters are immutable once built and can be queried from many threads.
//!
//! ## Example
//!
//! ```rust,ignore
//! use diffscopelib::query::{CheckKind, LintFilter};
//!
//! let filter = LintFilter::new(&entries);
//! if filter.accept(path, 42, CheckKind::General) {
//!     report(violation);
//! }
//! ```

pub mod analyzer;
pub mod authorship;
pub mod coverage;
pub mod lint;
pub mod paths;
pub mod span;

pub use analyzer::AnalyzerFilter;
pub use authorship::{AuthorshipFilter, PersonKind, PersonQuery};
pub use coverage::{
    collect_spans, CoverageFilter, FilterChain, IgnoreSink, Insn, InstructionFilter,
    InstructionSpan,
};
pub use lint::{CheckKind, LintFilter};
pub use paths::{SourceKey, SourceLayout, DEFAULT_SOURCE_ROOT};
pub use span::{Bound, BoundaryPolicy, SpanMatcher};
