//! GitHub API collaborator
//!
//! The release pipeline consumes GitHub through the `GithubApi` trait so
//! tests can substitute a recording double; `client::GithubClient` is the
//! production implementation. All calls are blocking; the pipeline is
//! strictly sequential.

pub mod client;

pub use client::GithubClient;

use crate::core::error::PilotResult;
use crate::version::Version;
use serde::Deserialize;

/// An issue (the tracking issue carries the progress dashboard in its body)
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
  pub number: u64,
  pub title: String,
  pub body: Option<String>,
  pub state: String,
  pub html_url: String,
}

/// A milestone; release milestones are titled `vX.Y.Z`
#[derive(Debug, Clone, Deserialize)]
pub struct Milestone {
  pub title: String,
  pub number: u64,
  pub html_url: String,
}

/// A published (or draft) release
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
  pub id: u64,
  pub tag_name: String,
  pub draft: bool,
  pub prerelease: bool,
  #[serde(default)]
  pub assets: Vec<ReleaseAsset>,
}

/// A binary asset attached to a release
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
  pub id: u64,
  pub name: String,
  pub content_type: String,
  pub browser_download_url: String,
}

/// A pull request (the release PR a human approves and merges)
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
  pub number: u64,
  pub title: String,
  pub body: Option<String>,
  pub state: String,
  pub html_url: String,
  pub draft: bool,
  pub merged_at: Option<String>,
}

impl PullRequest {
  pub fn merged(&self) -> bool {
    self.merged_at.is_some()
  }
}

/// A GitHub Actions workflow run
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
  pub id: u64,
  pub name: String,
  pub status: String,
  pub conclusion: Option<String>,
  pub html_url: String,
  pub path: String,
}

impl WorkflowRun {
  pub fn is_completed(&self) -> bool {
    self.status == "completed"
  }

  pub fn failed(&self) -> bool {
    self.conclusion.as_deref() == Some("failure")
  }
}

/// Everything the release pipeline asks of GitHub.
pub trait GithubApi {
  /// Identity of the human or automation that triggered the run
  fn actor(&self) -> PilotResult<String>;

  fn get_issue(&self, number: u64) -> PilotResult<Issue>;

  /// Replace the body of an issue
  fn change_issue_body(&self, number: u64, body: &str) -> PilotResult<()>;

  fn issue_assign(&self, number: u64, assignees: &[String]) -> PilotResult<()>;

  fn issue_unassign(&self, number: u64, assignees: &[String]) -> PilotResult<()>;

  /// Tag name of the latest release (prereleases included)
  fn latest_release(&self) -> PilotResult<String>;

  /// The rc numbers of published prereleases of `version`
  fn release_candidates(&self, version: &Version) -> PilotResult<Vec<u32>>;

  /// The smallest open `vX.Y.Z` milestone
  fn next_milestone(&self) -> PilotResult<Milestone>;

  fn open_milestone_issues(&self, milestone: u64) -> PilotResult<Vec<Issue>>;

  /// The open or closed PR whose head is `head` (`owner:branch`) and base
  /// is `base`, if one exists
  fn find_pr_for_branch(&self, head: &str, base: &str) -> PilotResult<Option<PullRequest>>;

  /// Open a draft pull request
  fn create_pr(&self, title: &str, body: &str, head: &str, base: &str)
  -> PilotResult<PullRequest>;

  fn release_assets(&self, tag: &str) -> PilotResult<Vec<ReleaseAsset>>;

  fn upload_asset(
    &self,
    tag: &str,
    filename: &str,
    content_type: &str,
    data: Vec<u8>,
  ) -> PilotResult<()>;

  fn download_asset(&self, asset_id: u64) -> PilotResult<Vec<u8>>;

  /// Workflow runs for a branch or tag at a specific head SHA
  fn workflow_runs(&self, branch: &str, head_sha: &str) -> PilotResult<Vec<WorkflowRun>>;
}
