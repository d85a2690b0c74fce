//! Blocking GitHub REST client

use crate::core::error::{ApiError, PilotError, PilotResult};
use crate::github::{GithubApi, Issue, Milestone, PullRequest, Release, ReleaseAsset, WorkflowRun};
use crate::version::Version;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.github.com";
const UPLOAD_URL: &str = "https://uploads.github.com";

/// GitHub REST client bound to one repository.
///
/// Reads work without a token (at a low rate limit); writes require the
/// `GITHUB_TOKEN` environment variable.
pub struct GithubClient {
  http: reqwest::blocking::Client,
  api_url: String,
  token: Option<String>,
  /// `owner/name` of the repository all calls operate on
  repository: String,
}

impl GithubClient {
  /// Create a client for `repository` (`owner/name`).
  ///
  /// The API base URL comes from `GITHUB_API_URL` when set (GitHub
  /// Enterprise, tests), the token from `GITHUB_TOKEN`.
  pub fn new(repository: String) -> PilotResult<Self> {
    let http = reqwest::blocking::Client::builder()
      .user_agent(concat!("release-pilot/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(30))
      .build()?;

    let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
    if token.is_none() {
      println!("Unauthorized (low rate limit applies; set GITHUB_TOKEN to increase it)");
    }

    Ok(Self {
      http,
      api_url: std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
      token,
      repository,
    })
  }

  pub fn repository(&self) -> &str {
    &self.repository
  }

  fn require_token(&self) -> PilotResult<&str> {
    self
      .token
      .as_deref()
      .ok_or(PilotError::Api(ApiError::MissingToken))
  }

  fn authorize(&self, request: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
    match &self.token {
      Some(token) => request.header("Authorization", format!("Token {}", token)),
      None => request,
    }
  }

  fn check(
    &self,
    url: &str,
    response: reqwest::blocking::Response,
  ) -> PilotResult<reqwest::blocking::Response> {
    if !response.status().is_success() {
      return Err(PilotError::Api(ApiError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      }));
    }
    Ok(response)
  }

  /// GET an API path (starting with a slash) and decode the JSON response.
  fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> PilotResult<T> {
    let url = format!("{}{}", self.api_url, path);
    let request = self.authorize(self.http.get(&url)).query(params);
    let response = self.check(&url, request.send()?)?;
    Ok(response.json()?)
  }

  /// PATCH an API path with a JSON body. Requires a token.
  fn patch(&self, path: &str, body: &serde_json::Value) -> PilotResult<()> {
    let token = self.require_token()?.to_string();
    let url = format!("{}{}", self.api_url, path);
    let response = self
      .http
      .patch(&url)
      .header("Authorization", format!("Token {}", token))
      .json(body)
      .send()?;
    self.check(&url, response)?;
    Ok(())
  }

  fn repo_path(&self, rest: &str) -> String {
    format!("/repos/{}{}", self.repository, rest)
  }

  /// The GitHub username for the current authenticated user
  fn username(&self) -> PilotResult<Option<String>> {
    if self.token.is_none() {
      return Ok(None);
    }
    #[derive(serde::Deserialize)]
    struct User {
      login: String,
    }
    let user: User = self.get("/user", &[])?;
    Ok(Some(user.login))
  }

  fn releases(&self) -> PilotResult<Vec<Release>> {
    self.get(&self.repo_path("/releases"), &[("per_page", "100".to_string())])
  }

  /// The release ID for a tag. Also finds draft releases, which are
  /// untagged, hence the scan over `tag_name` instead of the by-tag
  /// endpoint.
  fn release_id(&self, tag: &str) -> PilotResult<u64> {
    self
      .releases()?
      .into_iter()
      .find(|release| release.tag_name == tag)
      .map(|release| release.id)
      .ok_or_else(|| PilotError::message(format!("Release {} not found", tag)))
  }

  fn set_assignees(&self, method: reqwest::Method, number: u64, assignees: &[String]) -> PilotResult<()> {
    let token = self.require_token()?.to_string();
    let url = format!(
      "{}{}",
      self.api_url,
      self.repo_path(&format!("/issues/{}/assignees", number))
    );
    let response = self
      .http
      .request(method, &url)
      .header("Authorization", format!("Token {}", token))
      .json(&json!({ "assignees": assignees }))
      .send()?;
    self.check(&url, response)?;
    Ok(())
  }
}

impl GithubApi for GithubClient {
  fn actor(&self) -> PilotResult<String> {
    if let Ok(actor) = std::env::var("GITHUB_ACTOR") {
      if !actor.is_empty() {
        return Ok(actor);
      }
    }
    if let Some(login) = self.username()? {
      return Ok(login);
    }
    // Last resort: the repository owner.
    Ok(
      self
        .repository
        .split('/')
        .next()
        .unwrap_or(self.repository.as_str())
        .to_string(),
    )
  }

  fn get_issue(&self, number: u64) -> PilotResult<Issue> {
    self.get(&self.repo_path(&format!("/issues/{}", number)), &[])
  }

  fn change_issue_body(&self, number: u64, body: &str) -> PilotResult<()> {
    self.patch(
      &self.repo_path(&format!("/issues/{}", number)),
      &json!({ "body": body }),
    )
  }

  fn issue_assign(&self, number: u64, assignees: &[String]) -> PilotResult<()> {
    self.set_assignees(reqwest::Method::POST, number, assignees)
  }

  fn issue_unassign(&self, number: u64, assignees: &[String]) -> PilotResult<()> {
    self.set_assignees(reqwest::Method::DELETE, number, assignees)
  }

  fn latest_release(&self) -> PilotResult<String> {
    let release: Release = self.get(&self.repo_path("/releases/latest"), &[])?;
    Ok(release.tag_name)
  }

  fn release_candidates(&self, version: &Version) -> PilotResult<Vec<u32>> {
    let base = version.final_release();
    Ok(
      self
        .releases()?
        .into_iter()
        .filter(|release| release.prerelease && !release.draft)
        .filter_map(|release| Version::parse(&release.tag_name).ok())
        .filter(|candidate| candidate.final_release() == base)
        .filter_map(|candidate| candidate.rc)
        .collect(),
    )
  }

  fn next_milestone(&self) -> PilotResult<Milestone> {
    let milestones: Vec<Milestone> = self.get(&self.repo_path("/milestones"), &[])?;
    milestones
      .into_iter()
      .filter_map(|milestone| {
        let version = Version::parse(&milestone.title).ok()?;
        // Only exact vX.Y.Z titles count; vX.Y.x placeholders don't parse.
        (!version.is_rc()).then_some((version, milestone))
      })
      .min_by_key(|entry| entry.0)
      .map(|entry| entry.1)
      .ok_or_else(|| PilotError::message("No open release milestone found"))
  }

  fn open_milestone_issues(&self, milestone: u64) -> PilotResult<Vec<Issue>> {
    self.get(
      &self.repo_path("/issues"),
      &[
        ("milestone", milestone.to_string()),
        ("state", "open".to_string()),
      ],
    )
  }

  fn find_pr_for_branch(&self, head: &str, base: &str) -> PilotResult<Option<PullRequest>> {
    let prs: Vec<PullRequest> = self.get(
      &self.repo_path("/pulls"),
      &[
        ("state", "all".to_string()),
        ("head", head.to_string()),
        ("base", base.to_string()),
        ("per_page", "100".to_string()),
      ],
    )?;
    Ok(prs.into_iter().next())
  }

  fn create_pr(
    &self,
    title: &str,
    body: &str,
    head: &str,
    base: &str,
  ) -> PilotResult<PullRequest> {
    let token = self.require_token()?.to_string();
    let url = format!("{}{}", self.api_url, self.repo_path("/pulls"));
    let response = self
      .http
      .post(&url)
      .header("Authorization", format!("Token {}", token))
      .json(&json!({
        "title": title,
        "body": body,
        "head": head,
        "base": base,
        "draft": true,
      }))
      .send()?;
    Ok(self.check(&url, response)?.json()?)
  }

  fn release_assets(&self, tag: &str) -> PilotResult<Vec<ReleaseAsset>> {
    let id = self.release_id(tag)?;
    let release: Release = self.get(&self.repo_path(&format!("/releases/{}", id)), &[])?;
    Ok(release.assets)
  }

  fn upload_asset(
    &self,
    tag: &str,
    filename: &str,
    content_type: &str,
    data: Vec<u8>,
  ) -> PilotResult<()> {
    let token = self.require_token()?.to_string();
    let id = self.release_id(tag)?;
    let url = format!("{}/repos/{}/releases/{}/assets", UPLOAD_URL, self.repository, id);
    let response = self
      .http
      .post(&url)
      .header("Authorization", format!("Token {}", token))
      .header("Content-Type", content_type.to_string())
      .query(&[("name", filename)])
      .body(data)
      .send()?;
    self.check(&url, response)?;
    Ok(())
  }

  fn download_asset(&self, asset_id: u64) -> PilotResult<Vec<u8>> {
    let url = format!(
      "{}{}",
      self.api_url,
      self.repo_path(&format!("/releases/assets/{}", asset_id))
    );
    let request = self
      .authorize(self.http.get(&url))
      .header("Accept", "application/octet-stream");
    let response = self.check(&url, request.send()?)?;
    Ok(response.bytes()?.to_vec())
  }

  fn workflow_runs(&self, branch: &str, head_sha: &str) -> PilotResult<Vec<WorkflowRun>> {
    #[derive(serde::Deserialize)]
    struct Runs {
      workflow_runs: Vec<WorkflowRun>,
    }
    let runs: Runs = self.get(
      &self.repo_path("/actions/runs"),
      &[
        ("branch", branch.to_string()),
        ("head_sha", head_sha.to_string()),
      ],
    )?;
    Ok(runs.workflow_runs)
  }
}
