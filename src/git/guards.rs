//! Scoped working-tree guards
//!
//! Each guard bounds a mutation to the working tree and restores the
//! repository on every exit path. The happy path calls the explicit
//! `finish`/`restore` method so cleanup errors surface; if the guard is
//! instead dropped (early return, `?`, panic), the release action still
//! runs, reporting failures to stderr since `Drop` cannot return them.

use crate::core::error::PilotResult;
use crate::git::system_git::SystemGit;

/// Stashes uncommitted changes (tracked or untracked) on entry and pops
/// the stash on exit. Both ends are no-ops when the tree was clean.
pub struct StashGuard {
  git: SystemGit,
  stashed: bool,
  restored: bool,
}

impl StashGuard {
  pub fn new(git: SystemGit) -> PilotResult<Self> {
    let stashed = git.has_changes()?;
    if stashed {
      println!("Stashing local changes.");
      git.stash()?;
    }
    Ok(Self {
      git,
      stashed,
      restored: false,
    })
  }

  /// Pop the stash (if one was created) and defuse the drop handler.
  pub fn restore(mut self) -> PilotResult<()> {
    self.restored = true;
    if self.stashed {
      println!("Restoring stashed changes.");
      self.git.stash_pop()?;
    }
    Ok(())
  }
}

impl Drop for StashGuard {
  fn drop(&mut self) {
    if !self.restored && self.stashed {
      if let Err(err) = self.git.stash_pop() {
        eprintln!("⚠️  Failed to restore stashed changes: {}", err);
      }
    }
  }
}

/// Switches to a target branch on entry and returns to the branch that was
/// current at entry if it has since changed. Nested guards compose because
/// each records its own old branch.
pub struct CheckoutGuard {
  git: SystemGit,
  old_branch: String,
  restored: bool,
}

impl CheckoutGuard {
  pub fn new(git: SystemGit, branch: &str) -> PilotResult<Self> {
    let old_branch = git.current_branch()?;
    if branch != old_branch {
      println!("Checking out {} (from {}).", branch, old_branch);
      git.checkout(branch)?;
    }
    Ok(Self {
      git,
      old_branch,
      restored: false,
    })
  }

  /// Return to the entry branch and defuse the drop handler.
  pub fn restore(mut self) -> PilotResult<()> {
    self.restored = true;
    if self.git.current_branch()? != self.old_branch {
      println!("Moving back to {}.", self.old_branch);
      self.git.checkout(&self.old_branch)?;
    }
    Ok(())
  }
}

impl Drop for CheckoutGuard {
  fn drop(&mut self) {
    if self.restored {
      return;
    }
    match self.git.current_branch() {
      Ok(current) if current != self.old_branch => {
        if let Err(err) = self.git.checkout(&self.old_branch) {
          eprintln!("⚠️  Failed to return to {}: {}", self.old_branch, err);
        }
      }
      Ok(_) => {}
      Err(err) => eprintln!("⚠️  Could not determine current branch: {}", err),
    }
  }
}

/// Hard-resets the working tree on exit, discarding any uncommitted
/// mutation performed inside the bounded block. No-op on entry.
pub struct ResetOnExit {
  git: SystemGit,
  finished: bool,
}

impl ResetOnExit {
  pub fn new(git: SystemGit) -> Self {
    Self {
      git,
      finished: false,
    }
  }

  /// Reset now and defuse the drop handler.
  pub fn finish(mut self) -> PilotResult<()> {
    self.finished = true;
    self.git.reset_hard(None)
  }
}

impl Drop for ResetOnExit {
  fn drop(&mut self) {
    if !self.finished {
      if let Err(err) = self.git.reset_hard(None) {
        eprintln!("⚠️  Failed to reset working tree: {}", err);
      }
    }
  }
}
