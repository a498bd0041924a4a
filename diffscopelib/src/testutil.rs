//! Git repository fixtures for tests.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

pub const DEFAULT_NAME: &str = "test";
pub const DEFAULT_EMAIL: &str = "test@test.com";

/// A throwaway repository driven through the `git` executable.
pub struct TestRepo {
    dir: TempDir,
    clock: Cell<i64>,
}

impl TestRepo {
    /// Create an empty repository whose initial branch is `main`.
    pub fn init() -> Self {
        let repo = Self {
            dir: tempfile::tempdir().unwrap(),
            clock: Cell::new(1_700_000_000),
        };
        repo.git(&["init", "-q"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["config", "user.name", DEFAULT_NAME]);
        repo.git(&["config", "user.email", DEFAULT_EMAIL]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn open(&self) -> gix::Repository {
        gix::discover(self.path()).unwrap()
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        self.write_bytes(rel, content.as_bytes())
    }

    pub fn write_bytes(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path().join(rel)).unwrap();
    }

    pub fn add(&self, rel: &str) {
        self.git(&["add", "--", rel]);
    }

    /// Stage everything and commit as the default identity.
    pub fn commit_all(&self, message: &str) -> String {
        self.commit_as(message, DEFAULT_NAME, DEFAULT_EMAIL, DEFAULT_NAME, DEFAULT_EMAIL)
    }

    /// Stage everything and commit with explicit author and committer.
    pub fn commit_as(
        &self,
        message: &str,
        author: &str,
        author_email: &str,
        committer: &str,
        committer_email: &str,
    ) -> String {
        self.git(&["add", "-A"]);
        let output = self
            .dated(author, author_email, committer, committer_email)
            .args(["commit", "-q", "--allow-empty", "-m", message])
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git commit failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        self.git(&["rev-parse", "HEAD"])
    }

    /// Merge `branch` into the current branch with a merge commit made by
    /// `name`, and return the merge commit.
    pub fn merge_as(&self, branch: &str, message: &str, name: &str, email: &str) -> String {
        let output = self
            .dated(name, email, name, email)
            .args(["merge", "--no-ff", "-q", "-m", message, branch])
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git merge failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        self.git(&["rev-parse", "HEAD"])
    }

    /// Run git and report whether it succeeded, for commands expected to fail.
    pub fn try_git(&self, args: &[&str]) -> bool {
        self.dated(DEFAULT_NAME, DEFAULT_EMAIL, DEFAULT_NAME, DEFAULT_EMAIL)
            .args(args)
            .output()
            .unwrap()
            .status
            .success()
    }

    /// A git command with fixed identities and the next tick of the clock.
    fn dated(
        &self,
        author: &str,
        author_email: &str,
        committer: &str,
        committer_email: &str,
    ) -> Command {
        let tick = self.clock.get() + 60;
        self.clock.set(tick);
        let date = format!("{tick} +0000");
        let mut command = Command::new("git");
        command
            .env("GIT_AUTHOR_NAME", author)
            .env("GIT_AUTHOR_EMAIL", author_email)
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_NAME", committer)
            .env("GIT_COMMITTER_EMAIL", committer_email)
            .env("GIT_COMMITTER_DATE", &date)
            .current_dir(self.path());
        command
    }

    /// Run git in the repository and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}
