//! Git facade tests: partial rebase, amend-or-create commits, tag queries

use crate::helpers::{git, TestRepo};
use anyhow::Result;
use release_pilot::version::Version;

fn ok<T>(result: release_pilot::core::error::PilotResult<T>) -> Result<T> {
  result.map_err(|e| anyhow::anyhow!("{}", e))
}

#[test]
fn test_partial_rebase_moves_branch_tip() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("a.txt", "a")?;
  repo.commit_all("Add a")?;
  repo.write("b.txt", "b")?;
  repo.commit_all("Add b")?;

  // Two release commits on a branch, then master moves on.
  git(&repo.path, &["checkout", "-b", "release/v1.0.0"])?;
  repo.write("r1.txt", "r1")?;
  repo.commit_all("Release change 1")?;
  repo.write("r2.txt", "r2")?;
  repo.commit_all("Release change 2")?;
  git(&repo.path, &["checkout", "master"])?;
  repo.write("c.txt", "c")?;
  repo.commit_all("Add c")?;
  git(&repo.path, &["checkout", "release/v1.0.0"])?;

  let old_tip = repo.head_sha()?;
  let sys = repo.system_git()?;
  let moved = ok(sys.rebase("master", 2))?;

  assert!(moved, "rebase onto a new base must report movement");
  assert_ne!(repo.head_sha()?, old_tip);
  assert_eq!(repo.current_branch()?, "release/v1.0.0");
  assert_eq!(
    repo.log_titles(3)?,
    vec!["Release change 2", "Release change 1", "Add c"]
  );
  Ok(())
}

#[test]
fn test_rebase_onto_own_ancestor_is_noop() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("a.txt", "a")?;
  repo.commit_all("Add a")?;
  git(&repo.path, &["checkout", "-b", "release/v1.0.0"])?;
  repo.write("r1.txt", "r1")?;
  repo.commit_all("Release change 1")?;

  let old_tip = repo.head_sha()?;
  let sys = repo.system_git()?;
  let moved = ok(sys.rebase("master", 0))?;

  assert!(!moved, "branch already contains master; nothing to do");
  assert_eq!(repo.head_sha()?, old_tip);
  Ok(())
}

#[test]
fn test_commit_amends_on_matching_title() -> Result<()> {
  let repo = TestRepo::new()?;
  let sys = repo.system_git()?;

  repo.write("CHANGELOG.md", "## v1.0.0\nNotes.\n")?;
  ok(sys.add(&["CHANGELOG.md"]))?;
  ok(sys.commit("chore: Release v1.0.0", "Notes."))?;
  let count = repo.commit_count()?;

  // Same title: amend in place, history does not grow.
  repo.write("CHANGELOG.md", "## v1.0.0\nBetter notes.\n")?;
  ok(sys.add(&["CHANGELOG.md"]))?;
  ok(sys.commit("chore: Release v1.0.0", "Better notes."))?;
  assert_eq!(repo.commit_count()?, count);
  assert_eq!(repo.log_titles(1)?, vec!["chore: Release v1.0.0"]);

  // Different title: a new commit.
  repo.write("CHANGELOG.md", "## v1.0.0\nFinal notes.\n")?;
  ok(sys.add(&["CHANGELOG.md"]))?;
  ok(sys.commit("chore: Touch up notes", ""))?;
  assert_eq!(repo.commit_count()?, count + 1);
  Ok(())
}

#[test]
fn test_release_tags_sorted_newest_first() -> Result<()> {
  let repo = TestRepo::new()?;
  for tag in ["v0.9.0", "v1.0.0", "v1.2.3-rc.1", "v1.2.3", "nightly"] {
    git(&repo.path, &["tag", tag])?;
  }

  let sys = repo.system_git()?;
  let with_rc = ok(sys.release_tags(true))?;
  let expected: Vec<Version> = ["v1.2.3", "v1.2.3-rc.1", "v1.0.0", "v0.9.0"]
    .iter()
    .map(|t| Version::parse(t).unwrap())
    .collect();
  assert_eq!(with_rc, expected);

  let finals = ok(sys.release_tags(false))?;
  assert!(!finals.contains(&Version::parse("v1.2.3-rc.1").unwrap()));
  assert_eq!(finals.len(), 3);

  assert!(ok(sys.release_tag_exists(&Version::parse("v1.2.3").unwrap()))?);
  assert!(!ok(sys.release_tag_exists(&Version::parse("v2.0.0").unwrap()))?);
  Ok(())
}

#[test]
fn test_is_up_to_date_against_local_remote() -> Result<()> {
  let repo = TestRepo::new()?;
  let remote = tempfile::TempDir::new()?;
  git(remote.path(), &["init", "--bare", "--initial-branch=master"])?;
  git(
    &repo.path,
    &["remote", "add", "origin", &remote.path().display().to_string()],
  )?;
  git(&repo.path, &["push", "origin", "master"])?;

  let sys = repo.system_git()?;
  assert!(ok(sys.is_up_to_date("master", "origin"))?);

  repo.write("drift.txt", "drift")?;
  repo.commit_all("Drift ahead of the remote")?;
  assert!(!ok(sys.is_up_to_date("master", "origin"))?);
  Ok(())
}

#[test]
fn test_branches_with_and_without_remote() -> Result<()> {
  let repo = TestRepo::new()?;
  let remote = tempfile::TempDir::new()?;
  git(remote.path(), &["init", "--bare", "--initial-branch=master"])?;
  git(
    &repo.path,
    &["remote", "add", "origin", &remote.path().display().to_string()],
  )?;
  git(&repo.path, &["push", "origin", "master"])?;
  git(&repo.path, &["branch", "release/v1.0.0"])?;

  let sys = repo.system_git()?;
  let local = ok(sys.branches(None))?;
  assert!(local.contains(&"master".to_string()));
  assert!(local.contains(&"release/v1.0.0".to_string()));

  let remote_branches = ok(sys.branches(Some("origin")))?;
  assert!(remote_branches.contains(&"master".to_string()));
  assert!(!remote_branches.contains(&"release/v1.0.0".to_string()));
  Ok(())
}

#[test]
fn test_find_commit_sha_and_log() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("a.txt", "a")?;
  let sha = repo.commit_all("chore: Release v1.0.0")?;

  let sys = repo.system_git()?;
  assert_eq!(ok(sys.find_commit_sha("chore: Release v1.0.0"))?, sha);
  assert_eq!(ok(sys.find_commit_sha("no such commit"))?, "");
  assert_eq!(
    ok(sys.last_commit_message("master"))?,
    "chore: Release v1.0.0"
  );
  assert!(ok(sys.log("master", 10))?.contains(&"Initial commit".to_string()));
  Ok(())
}

#[test]
fn test_command_failure_carries_command() -> Result<()> {
  let repo = TestRepo::new()?;
  let sys = repo.system_git()?;
  let err = sys.checkout("no-such-branch").unwrap_err();
  let text = err.to_string();
  assert!(text.contains("git checkout"), "{}", text);
  Ok(())
}

#[test]
fn test_remote_slug_parsing() -> Result<()> {
  let repo = TestRepo::new()?;
  git(
    &repo.path,
    &["remote", "add", "ssh-style", "git@github.com:acme/widget.git"],
  )?;
  git(
    &repo.path,
    &["remote", "add", "https-style", "https://github.com/acme/widget"],
  )?;

  let sys = repo.system_git()?;
  let ssh = ok(sys.remote_slug("ssh-style"))?;
  assert_eq!(ssh.to_string(), "acme/widget");
  let https = ok(sys.remote_slug("https-style"))?;
  assert_eq!(https.to_string(), "acme/widget");
  Ok(())
}
