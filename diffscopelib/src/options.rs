//! Input options for diff-aware filtering.
//!
//! This module contains the configuration handed to [`crate::setup::prepare`]
//! by whatever glue drives the library (a CLI, a build plugin).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::edit::{DiffAlgorithm, LineComparison};
use crate::error::DiffscopeError;
use crate::query::authorship::{PersonKind, PersonQuery};
use crate::source::content::DEFAULT_BIG_FILE_THRESHOLD;
use crate::source::filter::FilterConfig;
use crate::Result;

/// What to do when the diff cannot be prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Log the failure and continue without diff-aware filtering.
    #[default]
    SkipFiltering,
    /// Propagate the failure to the caller.
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" | "skip-filtering" => Ok(FailurePolicy::SkipFiltering),
            "abort" | "fail" => Ok(FailurePolicy::Abort),
            _ => Err(format!("Unknown failure policy: {}", s)),
        }
    }
}

/// Configuration for computing the diff and building filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Old revision expression
    pub old_rev: Option<String>,
    /// New revision expression
    pub new_rev: Option<String>,
    /// Diff against the merge base of this ref and HEAD
    pub against: Option<String>,
    /// Report staged changes from the index
    pub include_staged: bool,
    /// Keep only lines last authored by this person
    pub author: Option<PersonQuery>,
    /// Keep only lines last committed by this person
    pub committer: Option<PersonQuery>,
    /// Content above this size is treated as binary
    pub big_file_threshold: u64,
    pub comparison: LineComparison,
    pub algorithm: DiffAlgorithm,
    /// Repository-relative path filter
    #[serde(skip)]
    pub filter: FilterConfig,
    pub failure_policy: FailurePolicy,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            old_rev: None,
            new_rev: None,
            against: None,
            include_staged: true,
            author: None,
            committer: None,
            big_file_threshold: DEFAULT_BIG_FILE_THRESHOLD,
            comparison: LineComparison::default(),
            algorithm: DiffAlgorithm::default(),
            filter: FilterConfig::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl DiffConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare two explicit revisions.
    pub fn revisions(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_rev = Some(old.into());
        self.new_rev = Some(new.into());
        self
    }

    /// Compare HEAD against its merge base with `rev`.
    pub fn against(mut self, rev: impl Into<String>) -> Self {
        self.against = Some(rev.into());
        self
    }

    pub fn include_staged(mut self, include: bool) -> Self {
        self.include_staged = include;
        self
    }

    pub fn author(mut self, query: PersonQuery) -> Self {
        self.author = Some(query);
        self
    }

    pub fn committer(mut self, query: PersonQuery) -> Self {
        self.committer = Some(query);
        self
    }

    pub fn big_file_threshold(mut self, bytes: u64) -> Self {
        self.big_file_threshold = bytes;
        self
    }

    pub fn comparison(mut self, comparison: LineComparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn algorithm(mut self, algorithm: DiffAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Diff-awareness is on when both revisions or an `against` ref are given.
    pub fn is_enabled(&self) -> bool {
        self.against.is_some() || (self.old_rev.is_some() && self.new_rev.is_some())
    }

    /// Reject half-specified revision pairs.
    pub fn validate(&self) -> Result<()> {
        if self.old_rev.is_some() != self.new_rev.is_some() {
            return Err(DiffscopeError::InvalidConfig(
                "old and new revisions must be given together".to_string(),
            ));
        }
        if self.against.is_some() && self.old_rev.is_some() {
            return Err(DiffscopeError::InvalidConfig(
                "'against' cannot be combined with explicit revisions".to_string(),
            ));
        }
        Ok(())
    }

    /// The person queries that constrain something, author first.
    pub fn person_queries(&self) -> impl Iterator<Item = (PersonKind, &PersonQuery)> + '_ {
        [
            (PersonKind::Author, self.author.as_ref()),
            (PersonKind::Committer, self.committer.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, query)| Some((kind, query?)))
        .filter(|(_, query)| !query.is_blank())
    }

    /// Whether blame is needed to build the authorship filters.
    pub fn needs_blame(&self) -> bool {
        self.person_queries().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiffConfig::new();
        assert!(config.include_staged);
        assert_eq!(config.big_file_threshold, 10 * 1024 * 1024);
        assert_eq!(config.failure_policy, FailurePolicy::SkipFiltering);
        assert!(!config.is_enabled());
        assert!(!config.needs_blame());
    }

    #[test]
    fn test_enabled() {
        assert!(DiffConfig::new().revisions("HEAD~1", "HEAD").is_enabled());
        assert!(DiffConfig::new().against("main").is_enabled());

        let mut half = DiffConfig::new();
        half.old_rev = Some("HEAD~1".to_string());
        assert!(!half.is_enabled());
        assert!(half.validate().is_err());
    }

    #[test]
    fn test_against_conflicts_with_revisions() {
        let config = DiffConfig::new().revisions("a", "b").against("main");
        assert!(matches!(
            config.validate(),
            Err(DiffscopeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_blank_person_query_needs_no_blame() {
        let config = DiffConfig::new()
            .against("main")
            .author(PersonQuery::new(Some("  "), None))
            .committer(PersonQuery::default());
        assert!(!config.needs_blame());
        assert_eq!(config.person_queries().count(), 0);

        let config = config.committer(PersonQuery::by_email("bob@example.com"));
        assert!(config.needs_blame());
        let kinds: Vec<PersonKind> = config.person_queries().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, vec![PersonKind::Committer]);
    }

    #[test]
    fn test_failure_policy_from_str() {
        assert_eq!("abort".parse::<FailurePolicy>(), Ok(FailurePolicy::Abort));
        assert_eq!("SKIP".parse::<FailurePolicy>(), Ok(FailurePolicy::SkipFiltering));
        assert!("maybe".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_serde_roundtrip_skips_filter() {
        let config = DiffConfig::new()
            .against("main")
            .author(PersonQuery::by_name("alice"))
            .filter(FilterConfig::new().include("src/**").unwrap());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("filter\""));

        let back: DiffConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.against.as_deref(), Some("main"));
        assert_eq!(back.author, Some(PersonQuery::by_name("alice")));
        assert!(back.filter.is_empty());
        assert!(back.needs_blame());
    }
}
