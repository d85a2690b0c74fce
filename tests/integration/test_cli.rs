//! CLI surface smoke tests (no network)

use crate::helpers::{run_release_pilot, TestRepo};
use anyhow::Result;

#[test]
fn test_help() -> Result<()> {
  let repo = TestRepo::new()?;
  let output = run_release_pilot(&repo.path, &["--help"])?;
  assert!(output.status.success());

  let stdout = String::from_utf8_lossy(&output.stdout);
  for flag in ["--branch", "--issue", "--dryrun", "--resume", "--production"] {
    assert!(stdout.contains(flag), "help must mention {}", flag);
  }
  Ok(())
}

#[test]
fn test_missing_issue_flag_fails() -> Result<()> {
  let repo = TestRepo::new()?;
  let output = run_release_pilot(&repo.path, &["--dryrun"])?;
  assert!(!output.status.success());

  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("--issue"), "{}", stderr);
  Ok(())
}

#[test]
fn test_outside_a_repository_fails_with_system_exit_code() -> Result<()> {
  let dir = tempfile::TempDir::new()?;
  let output = run_release_pilot(dir.path(), &["--issue", "1", "--dryrun"])?;
  assert!(!output.status.success());
  // Git/system errors exit 2.
  assert_eq!(output.status.code(), Some(2));

  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.to_lowercase().contains("repository"), "{}", stderr);
  Ok(())
}
