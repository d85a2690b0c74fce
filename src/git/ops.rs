//! Mutating git operations (fetch, rebase, tag, push, commit)

use crate::core::error::{GitError, PilotError, PilotResult};
use crate::git::system_git::SystemGit;
use std::path::Path;

impl SystemGit {
  /// Fetch tags and branches from one or more remotes.
  ///
  /// Makes sure our knowledge of the remote state is up-to-date. Fetches
  /// all branches and tags, prunes stale references, and overwrites local
  /// tags that moved on the remote.
  pub fn fetch(&self, remotes: &[&str]) -> PilotResult<()> {
    let mut args = vec!["fetch", "--quiet", "--tags", "--prune", "--force", "--multiple"];
    args.extend_from_slice(remotes);
    self.run(&args)?;
    Ok(())
  }

  /// Pull the current branch from a remote (rebase, not merge)
  pub fn pull(&self, remote: &str) -> PilotResult<()> {
    let branch = self.current_branch()?;
    self.run(&["pull", "--rebase", "--quiet", remote, &branch])?;
    Ok(())
  }

  /// Checkout a branch
  pub fn checkout(&self, branch: &str) -> PilotResult<()> {
    self.run(&["checkout", "--quiet", branch])?;
    Ok(())
  }

  /// Create a branch from a base branch and switch to it
  pub fn create_branch(&self, branch: &str, base: &str) -> PilotResult<()> {
    self.run(&["checkout", "--quiet", "-b", branch, base])?;
    Ok(())
  }

  /// Hard-reset the working tree, optionally to a specific ref
  pub fn reset_hard(&self, to: Option<&str>) -> PilotResult<()> {
    let mut args = vec!["reset", "--quiet", "--hard"];
    if let Some(target) = to {
      args.push(target);
    }
    self.run(&args)?;
    Ok(())
  }

  /// Add files to the index
  pub fn add(&self, paths: &[&str]) -> PilotResult<()> {
    let mut args = vec!["add"];
    args.extend_from_slice(paths);
    self.run(&args)?;
    Ok(())
  }

  /// Stash all uncommitted changes, including untracked files
  pub fn stash(&self) -> PilotResult<()> {
    self.run(&["stash", "--quiet", "--include-untracked"])?;
    Ok(())
  }

  /// Restore the most recent stash
  pub fn stash_pop(&self) -> PilotResult<()> {
    self.run(&["stash", "pop", "--quiet"])?;
    Ok(())
  }

  /// Rebase the current branch onto another branch.
  ///
  /// With `commits == 0` the whole branch history is rebased. Otherwise
  /// only the last `commits` commits move: the range-limited rebase leaves
  /// a temporary reference at the new tip, so the original branch name is
  /// re-pointed there afterwards.
  ///
  /// Returns true iff the branch tip SHA changed.
  pub fn rebase(&self, onto: &str, commits: usize) -> PilotResult<bool> {
    let old_sha = self.branch_sha("HEAD")?;

    if commits == 0 {
      self.run(&["rebase", "--quiet", onto])?;
    } else {
      let branch = self.current_branch()?;
      let base = format!("HEAD~{}", commits);
      self.run(&["rebase", "--quiet", "--onto", onto, &base])?;
      let new_sha = self.branch_sha("HEAD")?;
      self.checkout(&branch)?;
      self.reset_hard(Some(&new_sha))?;
    }

    Ok(old_sha != self.branch_sha("HEAD")?)
  }

  /// Create an annotated tag with a message, optionally signed
  pub fn tag(&self, tag: &str, message: &str, sign: bool) -> PilotResult<()> {
    let mut args = vec!["tag"];
    if sign {
      args.push("--sign");
    }
    args.extend_from_slice(&["--annotate", "--message", message, tag]);
    self.run(&args)?;
    Ok(())
  }

  /// Re-sign an existing tag, keeping its original message
  pub fn sign_tag(&self, tag: &str) -> PilotResult<()> {
    let target = format!("{}^{{}}", tag);
    self.run(&["tag", "--sign", "--force", tag, &target])?;
    Ok(())
  }

  /// Verify the signature of a tag
  pub fn verify_tag(&self, tag: &str) -> PilotResult<bool> {
    self.run_status(&["verify-tag", "--verbose", tag])
  }

  /// Push a branch to a remote
  pub fn push(&self, remote: &str, branch: &str, force: bool) -> PilotResult<()> {
    let mut args = vec!["push", "--quiet"];
    if force {
      args.push("--force");
    }
    args.extend_from_slice(&["--set-upstream", remote, branch]);

    self.run(&args).map_err(|err| match err {
      PilotError::Git(GitError::CommandFailed { stderr, .. }) => {
        PilotError::Git(GitError::PushFailed {
          remote: remote.to_string(),
          branch: branch.to_string(),
          reason: stderr,
        })
      }
      other => other,
    })?;
    Ok(())
  }

  /// Push a tag to a remote
  pub fn push_tag(&self, tag: &str, remote: &str) -> PilotResult<()> {
    self.run(&["push", "--quiet", "--force", remote, tag])?;
    Ok(())
  }

  /// Commit staged and tracked changes.
  ///
  /// If `title` equals the last commit's title on the current branch, the
  /// commit is amended in place instead. Re-running a stage therefore
  /// updates one release commit rather than growing a chain of
  /// near-duplicates.
  pub fn commit(&self, title: &str, body: &str) -> PilotResult<()> {
    let branch = self.current_branch()?;
    let amend = self.last_commit_message(&branch)? == title;

    let mut args = vec!["commit", "--quiet"];
    if amend {
      args.push("--amend");
    }
    args.extend_from_slice(&["--message", title, "--message", body]);
    self.run(&args)?;
    Ok(())
  }

  /// Write a tar archive of a tag's tree to `output`
  pub fn archive(&self, tag: &str, prefix: &str, output: &Path) -> PilotResult<()> {
    let prefix_arg = format!("--prefix={}/", prefix);
    let output_arg = format!("--output={}", output.display());
    self.run(&["archive", "--format=tar", &prefix_arg, tag, &output_arg])?;
    Ok(())
  }
}
