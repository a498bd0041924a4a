//! History computations: line edits, file diffs, blame and merge bases.
//!
//! Everything here runs synchronously against a `gix::Repository` and
//! returns plain owned values, so results can be handed to the query
//! filters and shared between threads once built.
//!
//! ## Example
//!
//! ```rust,ignore
//! use diffscopelib::data::{calculate_merge_base, DiffCalculator};
//!
//! let base = calculate_merge_base(".", "main", "HEAD")?;
//! let entries = DiffCalculator::new().calculate_diff(".", &base, "HEAD", true)?;
//! for entry in &entries {
//!     println!("{:?} {} ({} edits)", entry.change, entry.path(), entry.edits.len());
//! }
//! ```

pub mod blame;
pub mod diff;
pub mod edit;
pub mod entry;
pub mod merge_base;

pub use blame::{BlameCalculator, BlameLine, BlameResult, Identity};
pub use diff::DiffCalculator;
pub use edit::{split_lines, DiffAlgorithm, Edit, EditCalculator, EditKind, LineComparison};
pub use entry::{canonical_root, resolve_absolute, ChangeKind, DiffEntry};
pub use merge_base::calculate_merge_base;
