//! The release pipeline
//!
//! `Releaser` drives five fixed stages (Preparation, Review, Tagging,
//! Binaries, Publication) against one git repository and one tracking
//! issue. Progress is persisted on the issue's dashboard after every
//! transition, so the pipeline can be killed between any two stages (CI
//! jobs are ephemeral) and resumed by a later invocation. Stages that
//! depend on out-of-band action (a human approving the PR, CI building
//! binaries) pause the run instead of polling.

pub mod assets;
pub mod dashboard;

use crate::changelog::{self, Changelog};
use crate::core::config::ReleaseConfig;
use crate::core::context::RepoContext;
use crate::core::error::{PilotError, PilotResult};
use crate::git::{release_branch_name, CheckoutGuard, ResetOnExit, StashGuard, SystemGit};
use crate::github::GithubApi;
use crate::stage::{ProgressState, RunOutcome, Stage, StageOutcome, StageRunner};
use crate::version::Version;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
  if let Some(message) = panic.downcast_ref::<&str>() {
    message
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message
  } else {
    "unknown panic"
  }
}

/// Identity the tracking issue is assigned to while automation is driving.
/// Escalation hands the issue from this actor back to the triggering human.
pub const BOT_ACTOR: &str = "release-pilot-bot";

/// Title of the release commit (and the release PR) for a version
pub fn release_commit_message(version: &Version) -> String {
  format!("chore: Release {}", version)
}

const STAGES: [Stage<Releaser>; 5] = [
  Stage {
    name: dashboard::STAGES[0].0,
    label: dashboard::STAGES[0].1,
    run: Releaser::stage_preparation,
  },
  Stage {
    name: dashboard::STAGES[1].0,
    label: dashboard::STAGES[1].1,
    run: Releaser::stage_review,
  },
  Stage {
    name: dashboard::STAGES[2].0,
    label: dashboard::STAGES[2].1,
    run: Releaser::stage_tagging,
  },
  Stage {
    name: dashboard::STAGES[3].0,
    label: dashboard::STAGES[3].1,
    run: Releaser::stage_binaries,
  },
  Stage {
    name: dashboard::STAGES[4].0,
    label: dashboard::STAGES[4].1,
    run: Releaser::stage_publication,
  },
];

/// Drives one release from branch creation to publication.
pub struct Releaser {
  config: ReleaseConfig,
  root: PathBuf,
  git: SystemGit,
  github: Box<dyn GithubApi>,
  progress: ProgressState,
  version: Option<Version>,
}

impl Releaser {
  pub fn new(config: ReleaseConfig, ctx: RepoContext, github: Box<dyn GithubApi>) -> Self {
    Self {
      config,
      git: SystemGit::new(&ctx),
      root: ctx.root,
      github,
      progress: ProgressState::default(),
      version: None,
    }
  }

  /// Run the pipeline.
  ///
  /// The outer boundary never swallows failures: any error that is not
  /// `InvalidState` (a precondition violation, propagated directly) or
  /// already a `UserAbort` is routed through the escalation protocol and
  /// re-raised as the `UserAbort` escalation ends with. A panic unwinding
  /// out of a stage (the guards have already restored the working tree by
  /// then) is escalated the same way.
  pub fn run(&mut self) -> PilotResult<RunOutcome> {
    let result = match std::panic::catch_unwind(AssertUnwindSafe(|| self.run_inner())) {
      Ok(result) => result,
      Err(panic) => Err(PilotError::message(format!(
        "Terminated: {}",
        panic_message(&panic)
      ))),
    };
    result.map_err(|err| match err {
      PilotError::UserAbort => PilotError::UserAbort,
      PilotError::InvalidState(message) => PilotError::InvalidState(message),
      other => self.report_failure(self.version.as_ref(), &other),
    })
  }

  fn run_inner(&mut self) -> PilotResult<RunOutcome> {
    println!("Building release as GitHub user {}", self.github.actor()?);

    // The done-set only grows, so it is read back even outside resume
    // mode; --resume additionally skips the stages recorded there.
    self.read_progress()?;

    // Stash any local changes for the user to later resume working on,
    // run on the configured branch, and undo partial mutations no matter
    // how the stage sequence exits.
    let stash = StashGuard::new(self.git.clone())?;
    let branch = self.config.branch.clone();
    let checkout = CheckoutGuard::new(self.git.clone(), &branch)?;
    let reset = ResetOnExit::new(self.git.clone());

    self.require(
      self.git.current_branch()? == self.config.branch,
      "the release must start from the configured source branch",
    )?;
    self.require(self.git.is_clean()?, "the working tree must be clean")?;

    let version = self.determine_version()?;
    self.version = Some(version);
    println!("Target release: {}", version);

    let outcome = self.run_stages(&STAGES)?;

    reset.finish()?;
    checkout.restore()?;
    stash.restore()?;
    Ok(outcome)
  }

  /// Escalate a pipeline failure to a human.
  ///
  /// Reassigns the tracking issue from the automation actor to whoever
  /// triggered the run and stamps a failure banner onto the dashboard.
  /// Every step is best-effort, but a failed escalation must never
  /// silently continue the pipeline: this always returns `UserAbort` for the
  /// caller to raise.
  pub fn report_failure(&self, version: Option<&Version>, error: &PilotError) -> PilotError {
    match version {
      Some(version) => println!("Release {} failed: {}", version, error),
      None => println!("Release failed: {}", error),
    }

    if let Err(err) = self
      .github
      .issue_unassign(self.config.issue, &[BOT_ACTOR.to_string()])
    {
      eprintln!("⚠️  Could not unassign {}: {}", BOT_ACTOR, err);
    }
    match self.github.actor() {
      Ok(human) => {
        if let Err(err) = self.github.issue_assign(self.config.issue, &[human.clone()]) {
          eprintln!("⚠️  Could not assign {}: {}", human, err);
        }
      }
      Err(err) => eprintln!("⚠️  Could not determine the triggering actor: {}", err),
    }

    let banner = dashboard::failure_banner(&error.to_string());
    if let Err(err) = self.write_dashboard(Some(&banner)) {
      eprintln!("⚠️  Could not update the dashboard: {}", err);
    }

    PilotError::UserAbort
  }

  fn require(&self, condition: bool, message: &str) -> PilotResult<()> {
    if condition {
      Ok(())
    } else {
      Err(PilotError::invalid_state(message))
    }
  }

  /// The target version, determined once per invocation before any stage
  fn target_version(&self) -> PilotResult<Version> {
    self
      .version
      .ok_or_else(|| PilotError::invalid_state("target version not determined"))
  }

  fn upstream_main(&self) -> String {
    format!("{}/{}", self.config.upstream, self.config.main_branch)
  }

  /// Fetch remote state and decide which version this run releases.
  ///
  /// Precedence: explicit `--version` (with `latest` resolving to the
  /// newest published release), else the next open milestone: as-is for
  /// production, with the next free rc number otherwise.
  fn determine_version(&mut self) -> PilotResult<Version> {
    let mut remotes: Vec<&str> = vec![&self.config.upstream];
    if self.config.upstream != "origin" {
      remotes.push("origin");
    }
    println!("Fetching tags and branches from {}", remotes.join(", "));
    self.git.fetch(&remotes)?;

    if self.config.branch == self.config.main_branch
      && self.git.branch_sha("HEAD")?
        != self
          .git
          .branch_sha(&format!("{}/{}", self.config.upstream, self.config.branch))?
    {
      self.git.pull(&self.config.upstream)?;
    }

    if !self.config.version.is_empty() {
      if self.config.version == "latest" {
        let latest = self.github.latest_release()?;
        println!("Using latest release {}", latest);
        return Version::parse(&latest);
      }
      println!("Accepting override version {}", self.config.version);
      return Version::parse(&self.config.version);
    }

    let milestone = self.github.next_milestone()?;
    let base = Version::parse(&milestone.title)?;
    if self.config.production {
      Ok(base)
    } else {
      let rc = self
        .github
        .release_candidates(&base)?
        .into_iter()
        .max()
        .unwrap_or(0);
      Ok(base.with_rc(rc + 1))
    }
  }

  /// Read the dashboard persisted by a previous run
  fn read_progress(&mut self) -> PilotResult<()> {
    let issue = self.github.get_issue(self.config.issue)?;
    self.progress = dashboard::parse_progress_list(&issue.body.unwrap_or_default());
    if self.config.resume && !self.progress.done().is_empty() {
      println!(
        "Resuming; stages already done: {}",
        self
          .progress
          .done()
          .iter()
          .cloned()
          .collect::<Vec<_>>()
          .join(", ")
      );
    }
    Ok(())
  }

  /// Re-synthesize the dashboard section of the tracking issue
  fn write_dashboard(&self, failure: Option<&str>) -> PilotResult<()> {
    let section = dashboard::render_dashboard(&self.progress, failure);
    if self.config.dryrun {
      println!("Dry run; dashboard not written:\n{}", section);
      return Ok(());
    }
    let issue = self.github.get_issue(self.config.issue)?;
    let body = issue.body.unwrap_or_default();
    let updated = dashboard::splice_dashboard(&body, &section);
    self.github.change_issue_body(self.config.issue, &updated)
  }

  // ---- Stage bodies -----------------------------------------------------

  /// Preparation: create or refresh the release branch, commit the release
  /// notes, push, and open the release PR.
  fn stage_preparation(&mut self) -> PilotResult<StageOutcome> {
    let version = self.target_version()?;
    let release_branch = release_branch_name(&version);
    let message = release_commit_message(&version);

    let exists = self.git.branches(None)?.contains(&release_branch)
      || self.git.branches(Some("origin"))?.contains(&release_branch);
    if exists {
      self.git.checkout(&release_branch)?;
      if self.config.rebase {
        if self.git.last_commit_message(&release_branch)? == message {
          if self.git.rebase(&self.config.branch, 1)? {
            println!("Rebased '{}' onto {}", release_branch, self.config.branch);
          } else {
            println!("Branch '{}' already on {}", release_branch, self.config.branch);
          }
        } else {
          // No release commit on top yet; start over from the source branch.
          self.git.reset_hard(Some(&self.config.branch))?;
          println!("Reset '{}' to {}", release_branch, self.config.branch);
        }
      }
    } else {
      self.git.create_branch(&release_branch, &self.config.branch)?;
      let sha = self.git.branch_sha(&release_branch)?;
      println!("Branch '{}' created @ {}", release_branch, &sha[..7.min(sha.len())]);
    }
    self.require(
      self.git.current_branch()? == release_branch,
      "expected to be on the release branch after preparation",
    )?;

    let notes = match Changelog::load(&self.root)?.release_notes(&version) {
      Some(notes) => notes.to_string(),
      None => {
        return Ok(StageOutcome::ActionRequired(format!(
          "Please add release notes for {} to {}",
          version,
          changelog::DEFAULT_LOGFILE
        )));
      }
    };

    if self.git.is_clean()? {
      println!("No changes to commit");
    } else {
      let changes = self.git.changed_files()?;
      self.git.add(&[changelog::DEFAULT_LOGFILE])?;
      self.git.commit(&message, &notes)?;
      println!("Committed {} changed file(s)", changes.len());
    }

    if self.config.dryrun || self.config.verify {
      println!("Not pushing the release branch");
    } else {
      self.git.push("origin", &release_branch, self.config.force)?;
      self.ensure_pull_request(&version, &notes)?;
    }
    Ok(StageOutcome::Completed)
  }

  fn ensure_pull_request(&self, version: &Version, notes: &str) -> PilotResult<()> {
    let head = format!("{}:{}", self.github.actor()?, release_branch_name(version));
    let base = &self.config.main_branch;
    if let Some(pr) = self.github.find_pr_for_branch(&head, base)? {
      println!("PR already exists: {}", pr.html_url);
      return Ok(());
    }
    let pr = self
      .github
      .create_pr(&release_commit_message(version), notes, &head, base)?;
    println!("Created PR: {}", pr.html_url);
    Ok(())
  }

  /// Review: wait (across invocations) for a human to approve and merge
  /// the release PR. Production releases also require an empty milestone.
  fn stage_review(&mut self) -> PilotResult<StageOutcome> {
    let version = self.target_version()?;
    let message = release_commit_message(&version);

    if self.config.production {
      let milestone = self.github.next_milestone()?;
      let blocking = self
        .github
        .open_milestone_issues(milestone.number)?
        .into_iter()
        .filter(|issue| issue.title != message && issue.number != self.config.issue)
        .count();
      if blocking > 0 {
        return Err(PilotError::message(format!(
          "{} issues are still open for {}: {}",
          blocking, version, milestone.html_url
        )));
      }
      println!("No open issues left for {}", version);
    } else {
      println!("Release candidate; not checking the milestone");
    }

    let merged = self.git.log(&self.upstream_main(), 100)?.contains(&message);
    if !merged {
      return Ok(StageOutcome::ActionRequired(
        "Please approve and merge the release PR".to_string(),
      ));
    }

    self.git.checkout(&self.config.main_branch)?;
    self.git.pull(&self.config.upstream)?;
    Ok(StageOutcome::Completed)
  }

  /// Tagging: create, sign, verify and push the release tag.
  fn stage_tagging(&mut self) -> PilotResult<StageOutcome> {
    let version = self.target_version()?;
    let tag = version.to_string();

    self.git.checkout(&self.config.main_branch)?;
    if self.git.release_tag_exists(&version)? {
      println!("Tag {} already exists", tag);
    } else {
      let notes = Changelog::load(&self.root)?
        .release_notes(&version)
        .map(|notes| notes.to_string())
        .unwrap_or_else(|| format!("Release {}", version));
      self.git.tag(&tag, &notes, true)?;
      println!("Tagged {}", tag);
    }

    if !self.git.tag_has_signature(&tag)? {
      self.git.sign_tag(&tag)?;
    }
    if !self.git.verify_tag(&tag)? {
      return Err(PilotError::message(format!(
        "Signature verification failed for tag {}",
        tag
      )));
    }

    if self.config.dryrun {
      println!("Dry run; not pushing tag {}", tag);
    } else {
      self.git.push_tag(&tag, &self.config.upstream)?;
      println!("Pushed tag {} to {}", tag, self.config.upstream);
    }
    Ok(StageOutcome::Completed)
  }

  /// Binaries: wait for CI to build the tagged release, then attach source
  /// tarballs and detached signatures to it.
  fn stage_binaries(&mut self) -> PilotResult<StageOutcome> {
    let version = self.target_version()?;
    let tag = version.to_string();

    if self.config.dryrun {
      println!("Dry run; skipping binary builds and signing");
      return Ok(StageOutcome::Completed);
    }

    let head_sha = self.git.branch_sha(&tag)?;
    let runs = self.github.workflow_runs(&tag, &head_sha)?;
    if runs.is_empty() {
      return Ok(StageOutcome::ActionRequired(format!(
        "Waiting for release builds to start for {}",
        tag
      )));
    }
    if let Some(failed) = runs.iter().find(|run| run.failed()) {
      return Err(PilotError::message(format!(
        "Binaries failed to build: {}",
        failed.html_url
      )));
    }
    if runs.iter().any(|run| !run.is_completed()) {
      return Ok(StageOutcome::ActionRequired(
        "Waiting for release binaries to finish building".to_string(),
      ));
    }
    println!("Binaries built");

    self.ensure_tarballs(&tag)?;
    self.sign_release_assets(&tag)?;
    Ok(StageOutcome::Completed)
  }

  fn ensure_tarballs(&self, tag: &str) -> PilotResult<()> {
    let names: Vec<String> = self
      .github
      .release_assets(tag)?
      .into_iter()
      .map(|asset| asset.name)
      .collect();
    if assets::tarball_names(tag).iter().all(|name| names.contains(name)) {
      println!("Tarballs already created");
      return Ok(());
    }

    let slug = self.git.remote_slug(&self.config.upstream)?;
    let dir = tempfile::tempdir()?;
    for path in assets::create_tarballs(&self.git, tag, &slug.name, dir.path())? {
      let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| PilotError::message("Tarball path has no file name"))?;
      println!("Uploading {} to release {}", name, tag);
      let data = std::fs::read(&path)?;
      self
        .github
        .upload_asset(tag, &name, assets::content_type(&name), data)?;
    }
    Ok(())
  }

  fn sign_release_assets(&self, tag: &str) -> PilotResult<()> {
    let all = self.github.release_assets(tag)?;
    let names: Vec<String> = all.iter().map(|asset| asset.name.clone()).collect();
    let dir = tempfile::tempdir()?;

    for asset in all.iter().filter(|asset| assets::needs_signing(&asset.name, &names)) {
      println!("Signing {}", asset.name);
      let path = dir.path().join(&asset.name);
      std::fs::write(&path, self.github.download_asset(asset.id)?)?;
      let signature = assets::sign_detached(&path)?;
      let signature_name = format!("{}.asc", asset.name);
      self.github.upload_asset(
        tag,
        &signature_name,
        assets::content_type(&signature_name),
        std::fs::read(&signature)?,
      )?;
    }
    Ok(())
  }

  /// Publication: download every signable asset, verify its detached
  /// signature and digest sidecar, and declare the release final.
  fn stage_publication(&mut self) -> PilotResult<StageOutcome> {
    let version = self.target_version()?;
    let tag = version.to_string();

    if self.config.dryrun {
      println!("Dry run; skipping asset verification");
      return Ok(StageOutcome::Completed);
    }

    let all = self.github.release_assets(&tag)?;
    let by_name: HashMap<&str, _> = all.iter().map(|asset| (asset.name.as_str(), asset)).collect();
    let todo: Vec<_> = all
      .iter()
      .filter(|asset| assets::needs_signature(&asset.name))
      .collect();
    if todo.is_empty() {
      return Err(PilotError::message(format!(
        "No signable assets found on release {}",
        tag
      )));
    }

    let dir = tempfile::tempdir()?;
    for asset in &todo {
      let signature_name = format!("{}.asc", asset.name);
      let signature = by_name.get(signature_name.as_str()).ok_or_else(|| {
        PilotError::message(format!("Missing signature for {}", asset.name))
      })?;

      let data = self.github.download_asset(asset.id)?;
      let path = dir.path().join(&asset.name);
      std::fs::write(&path, &data)?;
      let signature_path = dir.path().join(&signature_name);
      std::fs::write(&signature_path, self.github.download_asset(signature.id)?)?;
      assets::verify_signature(&signature_path, &path)?;

      let sidecar_name = format!("{}.sha256", asset.name);
      if let Some(sidecar) = by_name.get(sidecar_name.as_str()) {
        let recorded = self.github.download_asset(sidecar.id)?;
        let recorded = String::from_utf8_lossy(&recorded);
        let recorded = recorded.split_whitespace().next().unwrap_or_default();
        if recorded != assets::sha256_hex(&data) {
          return Err(PilotError::message(format!(
            "Digest mismatch for {}",
            asset.name
          )));
        }
      }
      println!("Verified {}", asset.name);
    }

    println!("All {} release assets verified", todo.len());
    Ok(StageOutcome::Completed)
  }
}

impl StageRunner for Releaser {
  fn progress(&mut self) -> &mut ProgressState {
    &mut self.progress
  }

  fn resume(&self) -> bool {
    self.config.resume
  }

  fn persist_progress(&mut self) -> PilotResult<()> {
    self.write_dashboard(None)
  }
}
