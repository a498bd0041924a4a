//! Path filtering with glob pattern support.
//!
//! Diff entries are matched on their repository-relative, `/`-separated
//! new path (old path for deletions).

use glob::{MatchOptions, Pattern};

use crate::error::DiffscopeError;
use crate::Result;

/// Configuration for path filtering.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Glob patterns to include (if empty, include every path)
    pub include: Vec<Pattern>,
    /// Glob patterns to exclude
    pub exclude: Vec<Pattern>,
}

impl FilterConfig {
    /// Create a new empty filter config (includes every path).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an include pattern.
    pub fn include(mut self, pattern: &str) -> Result<Self> {
        self.include.push(compile(pattern)?);
        Ok(self)
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        self.exclude.push(compile(pattern)?);
        Ok(self)
    }

    /// Add multiple include patterns.
    pub fn include_many(mut self, patterns: &[&str]) -> Result<Self> {
        for pattern in patterns {
            self = self.include(pattern)?;
        }
        Ok(self)
    }

    /// Add multiple exclude patterns.
    pub fn exclude_many(mut self, patterns: &[&str]) -> Result<Self> {
        for pattern in patterns {
            self = self.exclude(pattern)?;
        }
        Ok(self)
    }

    /// Whether no pattern is configured.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Check if a repository-relative path passes the filter.
    ///
    /// A path matches if it matches no exclude pattern and at least one
    /// include pattern (or include is empty).
    pub fn matches(&self, path: &str) -> bool {
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };

        if self
            .exclude
            .iter()
            .any(|pattern| pattern.matches_with(path, options))
        {
            return false;
        }

        self.include.is_empty()
            || self
                .include
                .iter()
                .any(|pattern| pattern.matches_with(path, options))
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| DiffscopeError::InvalidGlob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = FilterConfig::new();
        assert!(filter.is_empty());
        assert!(filter.matches("src/main.rs"));
        assert!(filter.matches("README.md"));
    }

    #[test]
    fn test_filter_with_include_pattern() {
        let filter = FilterConfig::new().include("src/**/*.java").unwrap();

        assert!(filter.matches("src/main/java/Foo.java"));
        assert!(!filter.matches("src/main/resources/app.yml"));
        assert!(!filter.matches("other/Foo.java"));
    }

    #[test]
    fn test_filter_with_exclude_pattern() {
        let filter = FilterConfig::new().exclude("**/generated/**").unwrap();

        assert!(filter.matches("src/lib.rs"));
        assert!(!filter.matches("src/generated/model.rs"));
    }

    #[test]
    fn test_star_does_not_cross_directories() {
        let filter = FilterConfig::new().include("*.md").unwrap();

        assert!(filter.matches("README.md"));
        assert!(!filter.matches("docs/guide.md"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = FilterConfig::new()
            .include_many(&["src/**", "tests/**"])
            .unwrap()
            .exclude_many(&["**/fixtures/**"])
            .unwrap();

        assert!(filter.matches("src/a.rs"));
        assert!(filter.matches("tests/b.rs"));
        assert!(!filter.matches("tests/fixtures/c.rs"));
        assert!(!filter.matches("benches/d.rs"));
    }

    #[test]
    fn test_invalid_glob_pattern() {
        let result = FilterConfig::new().include("[invalid");

        assert!(result.is_err());
        if let Err(DiffscopeError::InvalidGlob { pattern, .. }) = result {
            assert_eq!(pattern, "[invalid");
        } else {
            panic!("Expected InvalidGlob error");
        }
    }
}
