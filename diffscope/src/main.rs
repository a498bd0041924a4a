//! # diffscope
//!
//! A CLI for inspecting which lines changed between two git revisions.
//!
//! ## Overview
//!
//! diffscope is built on top of diffscopelib. It prints the per-file line
//! edits between two revisions (staged changes included by default), blames
//! files, finds merge bases, and answers whether a finding at a given line
//! is inside the change, the same question lint, analyzer and coverage
//! integrations ask the library.
//!
//! ## Usage
//!
//! ```bash
//! # Staged changes against HEAD
//! diffscope diff
//!
//! # Changes on this branch since it forked from main
//! diffscope diff --against main
//!
//! # Two explicit revisions, as JSON
//! diffscope diff --old v1.0 --new HEAD --output json
//!
//! # Is line 42 of src/lib.rs part of the change?
//! diffscope check src/lib.rs 42 --against main
//!
//! # ...and was it written by alice?
//! diffscope check src/lib.rs 42 --against main --author-name alice
//!
//! # Merge base and blame
//! diffscope merge-base main feature
//! diffscope blame src/lib.rs --rev HEAD~3
//! ```
//!
//! `check` exits with status 0 when the line is in scope, 1 when it is not,
//! and 2 on errors.

mod render;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use console::Style;
use diffscopelib::{
    calculate_merge_base, prepare, BlameCalculator, CheckKind, DiffAlgorithm, DiffCalculator,
    DiffConfig, EditCalculator, FailurePolicy, FilterConfig, LineComparison, PersonKind,
    PersonQuery, SetupGuard,
};
use tracing_subscriber::EnvFilter;

use crate::render::{render_blame, render_entries};

const HEAD: &str = "HEAD";

static SETUP: SetupGuard = SetupGuard::new();

/// Build the clap Command structure
fn build_command() -> Command {
    Command::new("diffscope")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Arthur Debert")
        .about("Changed-line scoping for diff-aware code-quality checks")
        .subcommand_required(true)
        .arg(
            Arg::new("repo")
                .short('p')
                .long("repo")
                .default_value(".")
                .global(true)
                .help("Path inside the repository"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Log debug output to stderr"),
        )
        .subcommand(
            diff_args(Command::new("diff").about("Show changed files and their line edits")).arg(
                Arg::new("output")
                    .short('o')
                    .long("output")
                    .value_parser(["text", "json"])
                    .default_value("text")
                    .help("Output format"),
            ),
        )
        .subcommand(
            Command::new("merge-base")
                .about("Print the best common ancestor of two revisions")
                .arg(Arg::new("first").required(true).help("First revision"))
                .arg(Arg::new("second").required(true).help("Second revision")),
        )
        .subcommand(
            Command::new("blame")
                .about("Show which commit last touched each line")
                .arg(
                    Arg::new("paths")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Repository-relative paths"),
                )
                .arg(
                    Arg::new("rev")
                        .short('r')
                        .long("rev")
                        .default_value(HEAD)
                        .help("Revision to start from"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_parser(["text", "json"])
                        .default_value("text")
                        .help("Output format"),
                ),
        )
        .subcommand(
            diff_args(Command::new("check").about("Check whether a line is inside the change"))
                .arg(Arg::new("file").required(true).help("File of the finding"))
                .arg(
                    Arg::new("line")
                        .required(true)
                        .value_parser(value_parser!(u32))
                        .help("1-based line of the finding"),
                )
                .arg(
                    Arg::new("end")
                        .long("end")
                        .value_parser(value_parser!(u32))
                        .help("Last line of a multi-line finding (analyzer rules)"),
                )
                .arg(
                    Arg::new("separator")
                        .long("separator")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("end")
                        .help("The finding comes from a blank-line separator check"),
                ),
        )
}

/// Arguments shared by commands that compute a diff
fn diff_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("old")
            .long("old")
            .help("Old revision (defaults to HEAD)"),
    )
    .arg(
        Arg::new("new")
            .long("new")
            .help("New revision (defaults to HEAD)"),
    )
    .arg(
        Arg::new("against")
            .short('a')
            .long("against")
            .conflicts_with_all(["old", "new"])
            .help("Diff HEAD against its merge base with this ref"),
    )
    .arg(
        Arg::new("no-staged")
            .long("no-staged")
            .action(ArgAction::SetTrue)
            .help("Ignore changes staged in the index"),
    )
    .arg(
        Arg::new("include")
            .short('i')
            .long("include")
            .action(ArgAction::Append)
            .help("Include files matching glob pattern"),
    )
    .arg(
        Arg::new("exclude")
            .short('e')
            .long("exclude")
            .action(ArgAction::Append)
            .help("Exclude files matching glob pattern"),
    )
    .arg(
        Arg::new("big-file-threshold")
            .long("big-file-threshold")
            .value_parser(value_parser!(u64))
            .help("Files larger than this many bytes get no line edits"),
    )
    .arg(
        Arg::new("algorithm")
            .long("algorithm")
            .value_parser(["histogram", "myers", "myers-minimal"])
            .default_value("histogram")
            .help("Line diff algorithm"),
    )
    .arg(
        Arg::new("comparison")
            .long("comparison")
            .value_parser([
                "exact",
                "ignore-all-space",
                "ignore-leading-space",
                "ignore-trailing-space",
                "ignore-space-change",
            ])
            .default_value("exact")
            .help("How lines are compared"),
    )
    .arg(
        Arg::new("author-name")
            .long("author-name")
            .help("Only lines last authored by this name"),
    )
    .arg(
        Arg::new("author-email")
            .long("author-email")
            .help("Only lines last authored by this email"),
    )
    .arg(
        Arg::new("committer-name")
            .long("committer-name")
            .help("Only lines last committed by this name"),
    )
    .arg(
        Arg::new("committer-email")
            .long("committer-email")
            .help("Only lines last committed by this email"),
    )
}

/// Install the stderr log subscriber; `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build filter config from matches
fn build_filter(matches: &ArgMatches) -> Result<FilterConfig, anyhow::Error> {
    let mut filter = FilterConfig::new();

    if let Some(includes) = matches.get_many::<String>("include") {
        for pattern in includes {
            filter = filter.include(pattern)?;
        }
    }

    if let Some(excludes) = matches.get_many::<String>("exclude") {
        for pattern in excludes {
            filter = filter.exclude(pattern)?;
        }
    }

    Ok(filter)
}

fn person_query(matches: &ArgMatches, name: &str, email: &str) -> Option<PersonQuery> {
    let name = matches.get_one::<String>(name).map(String::as_str);
    let email = matches.get_one::<String>(email).map(String::as_str);
    let query = PersonQuery::new(name, email);
    (!query.is_blank()).then_some(query)
}

/// Map the shared diff flags onto a `DiffConfig`
fn build_config(matches: &ArgMatches) -> Result<DiffConfig, anyhow::Error> {
    let mut config = DiffConfig::new()
        .include_staged(!matches.get_flag("no-staged"))
        .filter(build_filter(matches)?)
        .failure_policy(FailurePolicy::Abort);

    config = match matches.get_one::<String>("against") {
        Some(against) => config.against(against),
        None => {
            let old = matches.get_one::<String>("old").map_or(HEAD, String::as_str);
            let new = matches.get_one::<String>("new").map_or(HEAD, String::as_str);
            config.revisions(old, new)
        }
    };

    if let Some(threshold) = matches.get_one::<u64>("big-file-threshold") {
        config = config.big_file_threshold(*threshold);
    }
    if let Some(algorithm) = matches.get_one::<String>("algorithm") {
        config = config.algorithm(algorithm.parse::<DiffAlgorithm>().map_err(|e| anyhow!(e))?);
    }
    if let Some(comparison) = matches.get_one::<String>("comparison") {
        config = config.comparison(comparison.parse::<LineComparison>().map_err(|e| anyhow!(e))?);
    }
    if let Some(author) = person_query(matches, "author-name", "author-email") {
        config = config.author(author);
    }
    if let Some(committer) = person_query(matches, "committer-name", "committer-email") {
        config = config.committer(committer);
    }

    config.validate()?;
    Ok(config)
}

/// Old and new revision expressions, with `--against` expanded
fn revision_pair(repo: &Path, config: &DiffConfig) -> Result<(String, String), anyhow::Error> {
    if let Some(against) = &config.against {
        let base = calculate_merge_base(repo, against, HEAD)?;
        if base.is_empty() {
            bail!("{} and {} have no common ancestor", against, HEAD);
        }
        return Ok((base, HEAD.to_string()));
    }
    let old = config.old_rev.clone().unwrap_or_else(|| HEAD.to_string());
    let new = config.new_rev.clone().unwrap_or_else(|| HEAD.to_string());
    Ok((old, new))
}

fn repo_path(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<String>("repo")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn is_json(matches: &ArgMatches) -> bool {
    matches.get_one::<String>("output").map(String::as_str) == Some("json")
}

/// Handler for diff command
fn diff_handler(matches: &ArgMatches) -> Result<ExitCode, anyhow::Error> {
    let repo = repo_path(matches);
    let config = build_config(matches)?;
    let (old, new) = revision_pair(&repo, &config)?;

    let calculator = DiffCalculator::new()
        .algorithm(config.algorithm)
        .comparison(config.comparison)
        .big_file_threshold(config.big_file_threshold)
        .filter(config.filter.clone());
    let entries = calculator.calculate_diff(&repo, &old, &new, config.include_staged)?;

    if is_json(matches) {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", render_entries(&entries, &old, &new));
    }
    Ok(ExitCode::SUCCESS)
}

/// Handler for merge-base command
fn merge_base_handler(matches: &ArgMatches) -> Result<ExitCode, anyhow::Error> {
    let repo = repo_path(matches);
    let first = matches
        .get_one::<String>("first")
        .context("missing first revision")?;
    let second = matches
        .get_one::<String>("second")
        .context("missing second revision")?;

    println!("{}", calculate_merge_base(&repo, first, second)?);
    Ok(ExitCode::SUCCESS)
}

/// Handler for blame command
fn blame_handler(matches: &ArgMatches) -> Result<ExitCode, anyhow::Error> {
    let repo = repo_path(matches);
    let paths: Vec<String> = matches
        .get_many::<String>("paths")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let rev = matches
        .get_one::<String>("rev")
        .map_or(HEAD, String::as_str);

    let results = BlameCalculator::new()
        .edit_calculator(EditCalculator::new())
        .calculate(&repo, &paths, rev)?;

    if is_json(matches) {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", render_blame(&results));
    }
    Ok(ExitCode::SUCCESS)
}

/// Handler for check command
fn check_handler(matches: &ArgMatches) -> Result<ExitCode, anyhow::Error> {
    let repo = repo_path(matches);
    let config = build_config(matches)?;
    let file = matches
        .get_one::<String>("file")
        .context("missing file")?;
    let line = *matches.get_one::<u32>("line").context("missing line")?;
    let end = matches.get_one::<u32>("end").copied();

    let scope = prepare(&repo, &config, &SETUP)?
        .ok_or_else(|| anyhow!("diff scope was not prepared"))?;

    let file = Path::new(file);
    let absolute = if file.is_absolute() {
        std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf())
    } else {
        scope.repo_root().join(file)
    };

    let mut in_scope = match end {
        Some(end) => scope.analyzer_filter().accept(&absolute, line, end),
        None => {
            let check = if matches.get_flag("separator") {
                CheckKind::BlankLineSeparator
            } else {
                CheckKind::General
            };
            scope.lint_filter().accept(&absolute, line, check)
        }
    };

    if in_scope {
        let relative = absolute
            .strip_prefix(scope.repo_root())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let blame = scope.blame().iter().find(|result| result.path == relative);
        let queries = [
            (PersonKind::Author, config.author.as_ref()),
            (PersonKind::Committer, config.committer.as_ref()),
        ];
        for (kind, query) in queries {
            let Some(query) = query else {
                continue;
            };
            let identity = blame.and_then(|blame| {
                (line as usize)
                    .checked_sub(1)
                    .and_then(|index| kind.identity(blame, index))
            });
            in_scope &= query.accepts(identity);
        }
    }

    let verdict = if in_scope {
        Style::new().green().apply_to("in scope")
    } else {
        Style::new().dim().apply_to("out of scope")
    };
    println!("{}:{} {}", file.display(), line, verdict);

    Ok(if in_scope {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn main() -> ExitCode {
    let matches = build_command().get_matches();
    init_logging(matches.get_flag("verbose"));

    let result = match matches.subcommand() {
        Some(("diff", sub)) => diff_handler(sub),
        Some(("merge-base", sub)) => merge_base_handler(sub),
        Some(("blame", sub)) => blame_handler(sub),
        Some(("check", sub)) => check_handler(sub),
        _ => Err(anyhow!("unknown command")),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_matches(args: &[&str]) -> ArgMatches {
        let matches = build_command().get_matches_from(args);
        let (_, sub) = matches.subcommand().unwrap();
        sub.clone()
    }

    #[test]
    fn test_command_is_valid() {
        build_command().debug_assert();
    }

    #[test]
    fn test_default_config_compares_head_with_index() {
        let config = build_config(&sub_matches(&["diffscope", "diff"])).unwrap();
        assert_eq!(config.old_rev.as_deref(), Some(HEAD));
        assert_eq!(config.new_rev.as_deref(), Some(HEAD));
        assert!(config.include_staged);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert!(!config.needs_blame());
    }

    #[test]
    fn test_config_from_flags() {
        let matches = sub_matches(&[
            "diffscope",
            "check",
            "src/lib.rs",
            "3",
            "--against",
            "main",
            "--no-staged",
            "--algorithm",
            "myers",
            "--comparison",
            "ignore-all-space",
            "--big-file-threshold",
            "1024",
            "--author-email",
            "alice@example.com",
        ]);
        let config = build_config(&matches).unwrap();
        assert_eq!(config.against.as_deref(), Some("main"));
        assert!(config.old_rev.is_none());
        assert!(!config.include_staged);
        assert_eq!(config.algorithm, DiffAlgorithm::Myers);
        assert_eq!(config.comparison, LineComparison::IgnoreAllWhitespace);
        assert_eq!(config.big_file_threshold, 1024);
        assert_eq!(config.author, Some(PersonQuery::by_email("alice@example.com")));
        assert!(config.committer.is_none());
    }

    #[test]
    fn test_invalid_glob_is_reported() {
        let matches = sub_matches(&["diffscope", "diff", "--include", "[unclosed"]);
        assert!(build_config(&matches).is_err());
    }
}
