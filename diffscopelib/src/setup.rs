//! One-shot preparation of the diff and the filters built from it.
//!
//! A host (build plugin, CLI) calls [`prepare`] once per process. The result
//! is an immutable [`DiffScope`] that hands out the line-range filters; it can
//! be wrapped in an `Arc` and queried from any thread.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::data::blame::{BlameCalculator, BlameResult};
use crate::data::diff::{open_repository, repository_root, DiffCalculator};
use crate::data::edit::EditCalculator;
use crate::data::entry::DiffEntry;
use crate::data::merge_base::merge_base_of;
use crate::error::DiffscopeError;
use crate::options::{DiffConfig, FailurePolicy};
use crate::query::{
    AnalyzerFilter, AuthorshipFilter, CoverageFilter, FilterChain, LintFilter, PersonKind,
    PersonQuery, SourceLayout,
};
use crate::source::revision::{resolve_revision, revision_for_commit, Revision};
use crate::Result;

const HEAD: &str = "HEAD";

/// Ensures setup runs at most once, however often the host calls it.
#[derive(Debug, Default)]
pub struct SetupGuard {
    done: AtomicBool,
}

impl SetupGuard {
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Mark setup as done. Returns `true` only for the first caller.
    pub fn claim(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }
}

/// The computed diff of one request, plus everything needed to build filters.
#[derive(Debug, Clone)]
pub struct DiffScope {
    repo_root: PathBuf,
    old_rev: String,
    new_rev: String,
    entries: Vec<DiffEntry>,
    blame: Vec<BlameResult>,
    author: Option<PersonQuery>,
    committer: Option<PersonQuery>,
}

impl DiffScope {
    /// Canonical work directory of the repository.
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Full hex id of the old revision.
    pub fn old_rev(&self) -> &str {
        &self.old_rev
    }

    /// Full hex id of the new revision.
    pub fn new_rev(&self) -> &str {
        &self.new_rev
    }

    /// Changed files, without deletions.
    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn blame(&self) -> &[BlameResult] {
        &self.blame
    }

    pub fn lint_filter(&self) -> LintFilter {
        LintFilter::new(&self.entries)
    }

    pub fn analyzer_filter(&self) -> AnalyzerFilter {
        AnalyzerFilter::new(&self.entries)
    }

    pub fn coverage_filter(&self, layout: &SourceLayout) -> CoverageFilter {
        CoverageFilter::new(&self.entries, layout)
    }

    /// One filter per configured person query, author first. Blank queries
    /// constrain nothing and get no filter.
    pub fn authorship_filters(&self, layout: &SourceLayout) -> Vec<AuthorshipFilter> {
        [
            (PersonKind::Author, &self.author),
            (PersonKind::Committer, &self.committer),
        ]
        .into_iter()
        .filter_map(|(kind, query)| Some((kind, query.as_ref()?)))
        .filter(|(_, query)| !query.is_blank())
        .map(|(kind, query)| {
            AuthorshipFilter::new(
                self.blame.clone(),
                &self.repo_root,
                layout,
                kind,
                Some(query.clone()),
            )
        })
        .collect()
    }

    /// The coverage filter followed by the authorship filters.
    pub fn instruction_filters(&self, layout: &SourceLayout) -> FilterChain {
        let mut chain = FilterChain::new().with(Arc::new(self.coverage_filter(layout)));
        if self.entries.is_empty() {
            return chain;
        }
        for filter in self.authorship_filters(layout) {
            chain.push(Arc::new(filter));
        }
        chain
    }
}

/// Compute the diff described by `config` and wrap it in a [`DiffScope`].
///
/// Returns `Ok(None)` when the guard was already claimed, when the config
/// does not enable diff-awareness, or when preparation failed under
/// [`FailurePolicy::SkipFiltering`]. An invalid config is an error and leaves
/// the guard unclaimed.
///
/// Staged changes are left out when a person query is set: blame describes
/// the committed new revision, not the index.
pub fn prepare(
    repo_path: impl AsRef<Path>,
    config: &DiffConfig,
    guard: &SetupGuard,
) -> Result<Option<Arc<DiffScope>>> {
    if !config.is_enabled() {
        debug!("no revisions configured, diff-aware filtering is off");
        return Ok(None);
    }
    config.validate()?;
    if !guard.claim() {
        debug!("diff scope already prepared");
        return Ok(None);
    }

    match build_scope(repo_path.as_ref(), config) {
        Ok(scope) => Ok(Some(Arc::new(scope))),
        Err(e) => {
            match config.against.as_deref() {
                Some(against) => error!("failed to prepare diff against [{}]: {}", against, e),
                None => error!(
                    "failed to prepare diff for old rev [{}] and new rev [{}]: {}",
                    config.old_rev.as_deref().unwrap_or_default(),
                    config.new_rev.as_deref().unwrap_or_default(),
                    e
                ),
            }
            match config.failure_policy {
                FailurePolicy::SkipFiltering => Ok(None),
                FailurePolicy::Abort => Err(e),
            }
        }
    }
}

fn build_scope(repo_path: &Path, config: &DiffConfig) -> Result<DiffScope> {
    let repo = open_repository(repo_path)?;
    let repo_root = repository_root(&repo)?;
    let (old, new) = resolve_pair(&repo, config)?;

    let edits = EditCalculator::new()
        .algorithm(config.algorithm)
        .comparison(config.comparison);
    let calculator = DiffCalculator::new()
        .algorithm(config.algorithm)
        .comparison(config.comparison)
        .big_file_threshold(config.big_file_threshold)
        .filter(config.filter.clone());

    // Blame reads the new revision, so staged line numbers would not line up with it.
    let include_staged = config.include_staged && !config.needs_blame();
    if config.include_staged && !include_staged {
        info!("person queries are set; diffing committed revisions only, without staged changes");
    }

    let entries: Vec<DiffEntry> = calculator
        .calculate(&repo, &old, &new, include_staged)?
        .into_iter()
        .filter(|entry| !entry.is_deleted())
        .collect();

    let blame = if config.needs_blame() && !entries.is_empty() {
        let paths: Vec<String> = entries
            .iter()
            .filter_map(|entry| entry.new_path.clone())
            .collect();
        BlameCalculator::new()
            .edit_calculator(edits)
            .big_file_threshold(config.big_file_threshold)
            .calculate(&repo_root, &paths, &new.hex())?
    } else {
        Vec::new()
    };

    info!(
        "diff scope {}..{}: {} files, {} blamed",
        old.spec(),
        new.spec(),
        entries.len(),
        blame.len()
    );

    Ok(DiffScope {
        repo_root,
        old_rev: old.hex(),
        new_rev: new.hex(),
        entries,
        blame,
        author: config.author.clone(),
        committer: config.committer.clone(),
    })
}

/// The old and new revisions, with `against` expanded to its merge base with HEAD.
fn resolve_pair(repo: &gix::Repository, config: &DiffConfig) -> Result<(Revision, Revision)> {
    if let Some(against) = config.against.as_deref() {
        let target = resolve_revision(repo, against)?;
        let head = resolve_revision(repo, HEAD)?;
        let base = merge_base_of(repo, target.id(), head.id())?.ok_or_else(|| {
            error!("failed to find the merge base between [{}] and [{}]", against, HEAD);
            DiffscopeError::UnresolvedRevision {
                spec: against.to_string(),
                message: format!("no common ancestor with {}", HEAD),
            }
        })?;
        let old = revision_for_commit(repo, &base.to_string(), base)?;
        return Ok((old, head));
    }

    match (config.old_rev.as_deref(), config.new_rev.as_deref()) {
        (Some(old), Some(new)) => Ok((resolve_revision(repo, old)?, resolve_revision(repo, new)?)),
        _ => Err(DiffscopeError::InvalidConfig(
            "no revisions to compare".to_string(),
        )),
    }
}
