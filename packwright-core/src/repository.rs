//! Version-control queries and mutations for a single working tree.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::process::{CommandOutcome, CommandRunner, Invocation};

/// Root directory of a version-controlled working tree.
///
/// Several units may share one location; it is never mutated through a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RepositoryLocation(PathBuf);

impl RepositoryLocation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.0
    }

    /// Checks the directory exists and carries VCS metadata.
    ///
    /// # Errors
    ///
    /// Returns an expectation failure naming the offending path.
    pub fn validate(&self) -> Result<()> {
        if !self.0.is_dir() {
            return Err(Error::expectation(format!(
                "{} does not exist.",
                self.0.display()
            )));
        }
        if !RepositoryGateway::is_repository(&self.0) {
            return Err(Error::expectation(format!(
                "{} is not a git repo.",
                self.0.display()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for RepositoryLocation {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Working-tree state relative to the index and the upstream branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryStatus {
    CleanAndUpToDate,
    Dirty,
    Ahead,
    Behind,
    Diverged,
    NotARepo,
}

impl RepositoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryStatus::CleanAndUpToDate => "clean and up to date",
            RepositoryStatus::Dirty => "has uncommitted changes",
            RepositoryStatus::Ahead => "ahead of its upstream",
            RepositoryStatus::Behind => "behind its upstream",
            RepositoryStatus::Diverged => "diverged from its upstream",
            RepositoryStatus::NotARepo => "not a repository",
        }
    }

    /// Interprets `status --porcelain=v2 --branch` output.
    pub fn from_porcelain(output: &str) -> Self {
        let mut ahead = 0u64;
        let mut behind = 0u64;

        for line in output.lines() {
            if let Some(counts) = line.strip_prefix("# branch.ab ") {
                for count in counts.split_whitespace() {
                    if let Some(n) = count.strip_prefix('+') {
                        ahead = n.parse().unwrap_or(0);
                    } else if let Some(n) = count.strip_prefix('-') {
                        behind = n.parse().unwrap_or(0);
                    }
                }
            } else if !line.starts_with('#') && !line.trim().is_empty() {
                return RepositoryStatus::Dirty;
            }
        }

        match (ahead > 0, behind > 0) {
            (true, true) => RepositoryStatus::Diverged,
            (true, false) => RepositoryStatus::Ahead,
            (false, true) => RepositoryStatus::Behind,
            (false, false) => RepositoryStatus::CleanAndUpToDate,
        }
    }
}

impl fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs VCS commands against working trees through a [`CommandRunner`].
///
/// Failures propagate unchanged; nothing here retries or recovers.
pub struct RepositoryGateway<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
    timeout: Duration,
}

impl<'a> RepositoryGateway<'a> {
    pub fn new(runner: &'a dyn CommandRunner, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    /// True iff `path` holds VCS metadata.
    pub fn is_repository(path: &Path) -> bool {
        path.join(".git").exists()
    }

    pub fn current_branch(&self, path: &Path) -> Result<String> {
        let outcome = self.git(path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(outcome.stdout.trim().to_string())
    }

    pub fn status(&self, path: &Path) -> Result<RepositoryStatus> {
        if !Self::is_repository(path) {
            return Ok(RepositoryStatus::NotARepo);
        }
        let outcome = self.git(path, &["status", "--porcelain=v2", "--branch"])?;
        let status = RepositoryStatus::from_porcelain(&outcome.stdout);
        debug!("{} is {}", path.display(), status);
        Ok(status)
    }

    pub fn has_uncommitted_changes(&self, path: &Path) -> Result<bool> {
        let outcome = self.git(path, &["status", "--porcelain"])?;
        Ok(!outcome.stdout.trim().is_empty())
    }

    /// Refreshes remote-tracking refs so ahead/behind counts are current.
    pub fn fetch(&self, path: &Path) -> Result<()> {
        self.git(path, &["fetch", "--quiet"])?;
        Ok(())
    }

    /// Discards all working-tree modifications of tracked files.
    pub fn revert_all_changes(&self, path: &Path) -> Result<()> {
        self.git(path, &["checkout", "."])?;
        Ok(())
    }

    /// Moves everything staged back out of the index.
    pub fn unstage_all(&self, path: &Path) -> Result<()> {
        self.git(path, &["reset", "--quiet"])?;
        Ok(())
    }

    /// Stages one file, given relative to the repository root.
    pub fn stage(&self, path: &Path, file: &Path) -> Result<()> {
        let file = file.to_string_lossy();
        self.git(path, &["add", file.as_ref()])?;
        Ok(())
    }

    /// Commits everything currently staged.
    pub fn commit_all(&self, path: &Path, message: &str) -> Result<()> {
        self.git(path, &["commit", "-m", message])?;
        Ok(())
    }

    pub fn tag(&self, path: &Path, tag_name: &str, message: &str) -> Result<()> {
        self.git(path, &["tag", "-a", tag_name, "-m", message])?;
        Ok(())
    }

    pub fn push_with_tags(&self, path: &Path) -> Result<()> {
        self.git(path, &["push", "--follow-tags"])?;
        Ok(())
    }

    fn git(&self, path: &Path, args: &[&str]) -> Result<CommandOutcome> {
        let invocation = Invocation::new(path, self.program.as_str())
            .args(args.iter().copied())
            .timeout(self.timeout);
        self.runner.run(&invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_porcelain_clean() {
        let output = "# branch.oid 1234\n# branch.head main\n# branch.upstream origin/main\n# branch.ab +0 -0\n";
        assert_eq!(
            RepositoryStatus::from_porcelain(output),
            RepositoryStatus::CleanAndUpToDate
        );
    }

    #[test]
    fn test_porcelain_without_upstream_is_clean() {
        let output = "# branch.oid 1234\n# branch.head main\n";
        assert_eq!(
            RepositoryStatus::from_porcelain(output),
            RepositoryStatus::CleanAndUpToDate
        );
    }

    #[test]
    fn test_porcelain_ahead_behind_diverged() {
        assert_eq!(
            RepositoryStatus::from_porcelain("# branch.ab +2 -0\n"),
            RepositoryStatus::Ahead
        );
        assert_eq!(
            RepositoryStatus::from_porcelain("# branch.ab +0 -3\n"),
            RepositoryStatus::Behind
        );
        assert_eq!(
            RepositoryStatus::from_porcelain("# branch.ab +1 -1\n"),
            RepositoryStatus::Diverged
        );
    }

    #[test]
    fn test_porcelain_dirty_wins() {
        let output = "# branch.ab +1 -0\n1 .M N... 100644 100644 100644 abc abc Core/Properties/AssemblyInfo.cs\n";
        assert_eq!(
            RepositoryStatus::from_porcelain(output),
            RepositoryStatus::Dirty
        );
        assert_eq!(
            RepositoryStatus::from_porcelain("? notes.txt\n"),
            RepositoryStatus::Dirty
        );
    }

    #[test]
    fn test_location_validate_missing() {
        let location = RepositoryLocation::new("/definitely/not/here");
        let err = location.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
