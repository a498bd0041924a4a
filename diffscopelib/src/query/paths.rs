//! Query-side path normalization.
//!
//! Coverage and authorship queries identify a file by its source key: the
//! path below a source root, e.g. `com/example/Foo.java` for
//! `<project>/src/main/java/com/example/Foo.java`. Diff entries and blame
//! results are mapped onto the same keys when the filters are built.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::entry::canonical_root;

/// Default source root below a project or module directory.
pub const DEFAULT_SOURCE_ROOT: &str = "src/main/java";

/// A `/`-separated path below a source root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey(String);

impl SourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a compiled class: its package directory plus source file name.
    ///
    /// `com/example/Foo$Inner` compiled from `Foo.java` maps to
    /// `com/example/Foo.java`; a class in the default package maps to the
    /// bare source file name.
    pub fn from_class(class_name: &str, source_file: &str) -> Self {
        match class_name.rfind('/') {
            Some(slash) => Self(format!("{}{}", &class_name[..=slash], source_file)),
            None => Self(source_file.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Where sources live inside a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    base_dir: PathBuf,
    modules: Vec<String>,
    source_roots: Vec<String>,
}

impl SourceLayout {
    /// A layout rooted at `base_dir` with the default source root.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: canonical_root(base_dir.as_ref()),
            modules: Vec::new(),
            source_roots: vec![DEFAULT_SOURCE_ROOT.to_string()],
        }
    }

    /// Sub-project directories, relative to the base directory.
    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = modules.into_iter().map(|m| trim_slashes(&m.into())).collect();
        self
    }

    /// Replace the source roots, relative to a project or module directory.
    pub fn with_source_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_roots = roots.into_iter().map(|r| trim_slashes(&r.into())).collect();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The source key of an absolute path, if it lies under a source root.
    pub fn key_for(&self, absolute: &Path) -> Option<SourceKey> {
        let relative = absolute.strip_prefix(&self.base_dir).ok()?;
        let relative = slash_path(relative)?;

        let within_module = self
            .modules
            .iter()
            .find_map(|module| strip_dir(&relative, module))
            .unwrap_or(relative.as_str());

        self.source_roots
            .iter()
            .find_map(|root| strip_dir(within_module, root))
            .filter(|key| !key.is_empty())
            .map(SourceKey::new)
    }
}

fn trim_slashes(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// `a/b/c` with `dir == "a"` becomes `b/c`.
fn strip_dir<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() {
        return Some(path);
    }
    path.strip_prefix(dir)?.strip_prefix('/')
}

fn slash_path(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}
