//! Run configuration: an immutable snapshot of release parameters
//!
//! Constructed once from the CLI in main and never mutated. Flags map 1:1
//! onto the command-line surface.

/// Immutable snapshot of the parameters for one release run.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
  /// The branch to build the release from
  pub branch: String,

  /// The branch the release branch is merged into
  pub main_branch: String,

  /// Name of the upstream remote (tags are pushed here)
  pub upstream: String,

  /// Version override. Empty means "next milestone"; the special value
  /// `latest` means the current latest release on GitHub.
  pub version: String,

  /// Number of the tracking issue carrying the progress dashboard
  pub issue: u64,

  /// Do not push changes or tags to any remote
  pub dryrun: bool,

  /// Force-push the release branch
  pub force: bool,

  /// Build a production release instead of a release candidate
  pub production: bool,

  /// Rebase the release branch onto the base branch if it already exists
  pub rebase: bool,

  /// Resume a previous run, skipping stages recorded done on the dashboard
  pub resume: bool,

  /// CI-mode: only check that the release branch makes sense
  pub verify: bool,

  /// Running inside GitHub Actions (affects actor detection)
  pub github_actions: bool,
}

#[cfg(test)]
impl ReleaseConfig {
  /// A config suitable for unit tests: local-only, no pushes.
  pub fn for_tests() -> Self {
    Self {
      branch: "master".to_string(),
      main_branch: "master".to_string(),
      upstream: "origin".to_string(),
      version: String::new(),
      issue: 1,
      dryrun: true,
      force: false,
      production: false,
      rebase: true,
      resume: false,
      verify: false,
      github_actions: false,
    }
  }
}
