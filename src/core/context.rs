//! Repository context - resolve the repo root once, pass everywhere
//!
//! Every component that touches the working tree receives this context
//! instead of re-resolving (or globally caching) the repository root.

use crate::core::error::{GitError, PilotError, PilotResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Location of the git repository a release run operates on.
///
/// Built once at startup from the current directory. The root is the
/// top-level working tree directory as reported by git itself.
#[derive(Debug, Clone)]
pub struct RepoContext {
  /// Working tree root (absolute path)
  pub root: PathBuf,
}

impl RepoContext {
  /// Resolve the repository containing `start`.
  pub fn discover(start: &Path) -> PilotResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(start)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(PilotError::Git(GitError::RepoNotFound {
          path: start.to_path_buf(),
        }));
      }
      return Err(PilotError::message(format!(
        "Failed to resolve repository root: {}",
        stderr
      )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(Self {
      root: PathBuf::from(stdout.trim()),
    })
  }
}
