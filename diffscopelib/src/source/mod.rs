//! Source access: revisions, file content and path filters.
//!
//! This module handles the first stage of the pipeline - deciding which
//! points in history are compared and reading the bytes on each side. It
//! provides:
//!
//! - **Revision resolution**: branch, tag, ancestry and `A...B` expressions
//! - **Content loading**: committed blobs, index entries and working files,
//!   classified as normal / missing / binary / submodule
//! - **Path filtering**: include/exclude glob patterns
//!
//! ## Example
//!
//! ```rust,ignore
//! use diffscopelib::source::{resolve_revision, ContentSource};
//!
//! let repo = gix::discover(".")?;
//! let head = resolve_revision(&repo, "HEAD")?;
//! let source = ContentSource::new(&repo, 10 * 1024 * 1024);
//! ```

pub mod content;
pub mod filter;
pub mod revision;

pub use content::{
    ContentClass, ContentOrigin, ContentSource, EntryKind, FileContent,
    DEFAULT_BIG_FILE_THRESHOLD,
};
pub use filter::FilterConfig;
pub use revision::{resolve_revision, Revision};
