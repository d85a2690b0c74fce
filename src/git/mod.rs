//! Git operations via system git (zero git crate dependencies)
//!
//! Every operation is a blocking `git` subprocess invocation; a non-zero
//! exit status surfaces as `GitError::CommandFailed` with the command line
//! and status. Retry policy, if any, belongs to the stage layer.

pub mod guards;
mod ops;
pub mod system_git;

pub use guards::{CheckoutGuard, ResetOnExit, StashGuard};
pub use system_git::SystemGit;

use crate::version::Version;

/// Prefix for release branches (`release/v1.2.3`)
pub const RELEASE_BRANCH_PREFIX: &str = "release";

/// The branch name a release is prepared on
pub fn release_branch_name(version: &Version) -> String {
  format!("{}/{}", RELEASE_BRANCH_PREFIX, version)
}

/// Owner and repository name parsed from a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
  pub owner: String,
  pub name: String,
}

impl std::fmt::Display for RepoSlug {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}", self.owner, self.name)
  }
}
