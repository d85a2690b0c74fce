//! System git backend and read queries
//!
//! Uses git plumbing commands for all queries. Subprocesses run with an
//! isolated environment so user configuration cannot change behavior
//! underneath the release workflow.

use crate::core::context::RepoContext;
use crate::core::error::{GitError, PilotError, PilotResult, ResultExt};
use crate::git::RepoSlug;
use crate::version::Version;
use std::path::PathBuf;
use std::process::Command;

/// Git backend using system git.
///
/// Cloning is cheap (the handle is just the working tree path); guards
/// take their own handle so they can restore state no matter what the
/// protected block did with the original.
#[derive(Clone)]
pub struct SystemGit {
  /// Working tree root
  root: PathBuf,
}

impl SystemGit {
  /// Create a backend for the repository in `ctx`.
  pub fn new(ctx: &RepoContext) -> Self {
    Self {
      root: ctx.root.clone(),
    }
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Sets working directory to the repository root
  /// - Clears environment variables, whitelisting PATH, HOME and the
  ///   GNUPGHOME/GPG_TTY pair needed for tag signing
  /// - Adds safe configuration overrides
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.root);

    cmd.env_clear();
    for var in ["PATH", "HOME", "GNUPGHOME", "GPG_TTY"] {
      if let Ok(value) = std::env::var(var) {
        cmd.env(var, value);
      }
    }

    cmd.arg("-c").arg("protocol.version=2");
    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false");

    cmd
  }

  /// Run a git command, returning stdout on success.
  pub(crate) fn run(&self, args: &[&str]) -> PilotResult<String> {
    let output = self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

    if !output.status.success() {
      return Err(PilotError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        status: output.status.code().unwrap_or(-1),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
  }

  /// Run a git command, returning only whether it exited zero.
  pub(crate) fn run_status(&self, args: &[&str]) -> PilotResult<bool> {
    let status = self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute git {}", args.join(" ")))?
      .status;
    Ok(status.success())
  }

  /// Get current branch name
  pub fn current_branch(&self) -> PilotResult<String> {
    Ok(self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?.trim().to_string())
  }

  /// Get the commit SHA a branch or ref points at
  pub fn branch_sha(&self, branch: &str) -> PilotResult<String> {
    Ok(self.run(&["rev-list", "--max-count=1", branch])?.trim().to_string())
  }

  /// List branches, optionally from a remote.
  ///
  /// With a remote, names are returned without the `<remote>/` prefix.
  pub fn branches(&self, remote: Option<&str>) -> PilotResult<Vec<String>> {
    let mut args = vec!["branch", "--list", "--no-column", "--format=%(refname:short)"];
    if remote.is_some() {
      args.push("--remotes");
    }
    let listed: Vec<String> = self.run(&args)?.lines().map(|b| b.to_string()).collect();

    match remote {
      None => Ok(listed),
      Some(remote) => {
        let prefix = format!("{}/", remote);
        Ok(
          listed
            .iter()
            .filter_map(|b| b.strip_prefix(&prefix))
            .map(|b| b.to_string())
            .collect(),
        )
      }
    }
  }

  /// List remote names (e.g. origin, upstream)
  pub fn remotes(&self) -> PilotResult<Vec<String>> {
    Ok(self.run(&["remote"])?.lines().map(|r| r.to_string()).collect())
  }

  /// Owner and repository name of a remote
  pub fn remote_slug(&self, remote: &str) -> PilotResult<RepoSlug> {
    let url = self.run(&["remote", "get-url", remote])?.trim().to_string();

    // Handles both SSH (git@host:owner/name.git) and HTTPS forms.
    let trimmed = url.strip_suffix(".git").unwrap_or(&url);
    let (owner, name) = trimmed
      .rsplit_once('/')
      .and_then(|(head, name)| {
        let owner = head.rsplit(['/', ':']).next()?;
        Some((owner, name))
      })
      .ok_or_else(|| PilotError::message(format!("Could not parse remote URL: {}", url)))?;

    Ok(RepoSlug {
      owner: owner.to_string(),
      name: name.to_string(),
    })
  }

  /// Release tags merged into HEAD, sorted newest first.
  ///
  /// Tags that do not parse as release versions are ignored; release
  /// candidates are filtered out unless `with_rc` is set.
  pub fn release_tags(&self, with_rc: bool) -> PilotResult<Vec<Version>> {
    let mut tags: Vec<Version> = self
      .run(&["tag", "--merged"])?
      .lines()
      .filter_map(|tag| Version::parse(tag.trim()).ok())
      .filter(|v| with_rc || !v.is_rc())
      .collect();
    tags.sort();
    tags.reverse();
    Ok(tags)
  }

  /// Check if a release tag exists
  pub fn release_tag_exists(&self, version: &Version) -> PilotResult<bool> {
    Ok(self.release_tags(true)?.contains(version))
  }

  /// The most recent `v*` tag reachable from HEAD
  pub fn current_tag(&self) -> PilotResult<String> {
    Ok(
      self
        .run(&["describe", "--tags", "--abbrev=0", "--match", "v*"])?
        .trim()
        .to_string(),
    )
  }

  /// Whether there are tracked changes (optionally against the index)
  fn diff_exitcode(&self, cached: bool) -> PilotResult<bool> {
    let mut args = vec!["diff", "--quiet", "--exit-code"];
    if cached {
      args.push("--cached");
    }
    Ok(!self.run_status(&args)?)
  }

  /// Check if the working directory is clean (no pending or staged changes)
  pub fn is_clean(&self) -> PilotResult<bool> {
    Ok(!self.diff_exitcode(false)? && !self.diff_exitcode(true)?)
  }

  /// Whether anything in the working tree differs from HEAD, including
  /// untracked files. This is what decides whether a stash is needed.
  pub fn has_changes(&self) -> PilotResult<bool> {
    Ok(!self.run(&["status", "--porcelain"])?.trim().is_empty())
  }

  /// Files changed relative to HEAD
  pub fn changed_files(&self) -> PilotResult<Vec<String>> {
    Ok(
      self
        .run(&["diff", "--name-only", "HEAD"])?
        .lines()
        .map(|l| l.to_string())
        .collect(),
    )
  }

  /// The last `count` commit titles on a branch, newest first
  pub fn log(&self, branch: &str, count: usize) -> PilotResult<Vec<String>> {
    let max = format!("--max-count={}", count);
    Ok(
      self
        .run(&["log", "--oneline", "--no-decorate", &max, branch])?
        .lines()
        .filter_map(|line| line.split_once(' ').map(|(_, title)| title.trim().to_string()))
        .collect(),
    )
  }

  /// The title of the most recent commit on a branch
  pub fn last_commit_message(&self, branch: &str) -> PilotResult<String> {
    self
      .log(branch, 1)?
      .into_iter()
      .next()
      .ok_or_else(|| PilotError::message(format!("Branch {} has no commits", branch)))
  }

  /// Find the SHA of the newest commit whose message matches `message`.
  /// Empty when no commit matches.
  pub fn find_commit_sha(&self, message: &str) -> PilotResult<String> {
    Ok(
      self
        .run(&["log", "--format=%H", "--grep", message, "-1"])?
        .trim()
        .to_string(),
    )
  }

  /// Check if a branch SHA is equal to its remote counterpart
  pub fn is_up_to_date(&self, branch: &str, remote: &str) -> PilotResult<bool> {
    if !self.branches(Some(remote))?.contains(&branch.to_string()) {
      return Ok(false);
    }
    Ok(self.branch_sha(branch)? == self.branch_sha(&format!("{}/{}", remote, branch))?)
  }

  /// Check if a tag object carries a PGP signature
  pub fn tag_has_signature(&self, tag: &str) -> PilotResult<bool> {
    Ok(
      self
        .run(&["cat-file", "tag", tag])?
        .contains("-----BEGIN PGP SIGNATURE-----"),
    )
  }
}
