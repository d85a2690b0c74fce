use clap::Parser;
use release_pilot::core::config::ReleaseConfig;
use release_pilot::core::context::RepoContext;
use release_pilot::core::error::{print_error, PilotResult};
use release_pilot::git::SystemGit;
use release_pilot::github::GithubClient;
use release_pilot::release::Releaser;
use release_pilot::stage::RunOutcome;

/// Drive a release from branch creation to publication, tracking progress
/// on a GitHub issue dashboard. Meant to run in a GitHub Actions workflow,
/// but can also be run locally.
#[derive(Parser)]
#[command(name = "release-pilot")]
#[command(about, long_about = None)]
#[command(styles = get_styles())]
struct Cli {
  /// The branch to build the release from
  #[arg(long, default_value = "master")]
  branch: String,

  /// The branch to merge the release branch into
  #[arg(long, default_value = "master")]
  main_branch: String,

  /// The name of the upstream remote
  #[arg(long, default_value = "upstream")]
  upstream: String,

  /// Version to release. The special value 'latest' means the current
  /// latest release on GitHub. Default: next milestone
  #[arg(long, default_value = "")]
  version: String,

  /// Number of the tracking issue carrying the progress dashboard
  #[arg(long)]
  issue: u64,

  /// Do not push changes or tags to any remote
  #[arg(long)]
  dryrun: bool,

  /// Do not force-push the release branch (force-push is the default)
  #[arg(long)]
  no_force: bool,

  /// Build a production release. If not set, build a release candidate
  #[arg(long)]
  production: bool,

  /// Do not rebase an existing release branch onto the base branch
  #[arg(long)]
  no_rebase: bool,

  /// Resume a previous run, skipping stages recorded done on the dashboard
  #[arg(long)]
  resume: bool,

  /// CI-mode: check that the release branch makes sense, without pushing
  #[arg(long)]
  verify: bool,

  /// Force GitHub Actions mode (auto-detected from the environment)
  #[arg(long)]
  github_actions: bool,
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
}

fn main() {
  let cli = Cli::parse();

  let config = ReleaseConfig {
    branch: cli.branch,
    main_branch: cli.main_branch,
    upstream: cli.upstream,
    version: cli.version,
    issue: cli.issue,
    dryrun: cli.dryrun,
    force: !cli.no_force,
    production: cli.production,
    rebase: !cli.no_rebase,
    resume: cli.resume,
    verify: cli.verify,
    github_actions: cli.github_actions || std::env::var_os("GITHUB_ACTIONS").is_some(),
  };

  match run(config) {
    Ok(RunOutcome::Completed) => println!("🎉 Release complete"),
    Ok(RunOutcome::Paused) => {
      println!("⏸  Waiting for external action; a later run with --resume continues from here");
    }
    Err(err) => {
      print_error(&err);
      std::process::exit(err.exit_code().as_i32());
    }
  }
}

fn run(config: ReleaseConfig) -> PilotResult<RunOutcome> {
  let cwd = std::env::current_dir()?;
  let ctx = RepoContext::discover(&cwd)?;

  let repository = match std::env::var("GITHUB_REPOSITORY") {
    Ok(slug) if !slug.is_empty() => slug,
    _ => {
      // Fall back to the remote URL: upstream first, then origin.
      let git = SystemGit::new(&ctx);
      git
        .remote_slug(&config.upstream)
        .or_else(|_| git.remote_slug("origin"))?
        .to_string()
    }
  };

  let github = GithubClient::new(repository)?;
  let mut releaser = Releaser::new(config, ctx, Box::new(github));
  releaser.run()
}
