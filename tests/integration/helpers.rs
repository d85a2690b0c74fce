//! Test helpers for integration tests

use anyhow::{Context, Result};
use release_pilot::core::context::RepoContext;
use release_pilot::git::SystemGit;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A throwaway git repository with an initial commit
pub struct TestRepo {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestRepo {
  /// Create a repository with one commit on `master`
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    git(&path, &["init", "--initial-branch=master"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;
    git(&path, &["config", "commit.gpgsign", "false"])?;
    git(&path, &["config", "tag.gpgsign", "false"])?;

    std::fs::write(path.join("README.md"), "# Test repo\n")?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial commit"])?;

    Ok(Self { _root: root, path })
  }

  /// A git facade bound to this repository
  pub fn system_git(&self) -> Result<SystemGit> {
    let ctx = RepoContext::discover(&self.path).map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(SystemGit::new(&ctx))
  }

  /// Write (or overwrite) a file
  pub fn write(&self, file: &str, content: &str) -> Result<()> {
    std::fs::write(self.path.join(file), content)?;
    Ok(())
  }

  /// Read a file
  pub fn read(&self, file: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(file))?)
  }

  /// Stage everything and commit, returning the new HEAD SHA
  pub fn commit_all(&self, message: &str) -> Result<String> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;
    self.head_sha()
  }

  pub fn head_sha(&self) -> Result<String> {
    let output = git(&self.path, &["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Number of commits reachable from HEAD
  pub fn commit_count(&self) -> Result<usize> {
    let output = git(&self.path, &["rev-list", "--count", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().parse()?)
  }

  /// Commit titles, newest first
  pub fn log_titles(&self, n: usize) -> Result<Vec<String>> {
    let output = git(&self.path, &["log", &format!("-{}", n), "--format=%s"])?;
    Ok(
      String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(String::from)
        .collect(),
    )
  }

  /// Whether `git status` reports anything (staged, unstaged or untracked)
  pub fn is_dirty(&self) -> Result<bool> {
    let output = git(&self.path, &["status", "--porcelain"])?;
    Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
  }

  /// Whether the stash has entries
  pub fn has_stash(&self) -> Result<bool> {
    let output = git(&self.path, &["stash", "list"])?;
    Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
  }

  pub fn current_branch(&self) -> Result<String> {
    let output = git(&self.path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }
}

/// Run git in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run the release-pilot binary, returning its output without asserting
/// success (tests check exit codes themselves)
pub fn run_release_pilot(cwd: &Path, args: &[&str]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_release-pilot");
  Command::new(bin)
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run release-pilot")
}
