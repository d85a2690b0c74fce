//! Scoped guard tests: stash, checkout, reset-on-exit

use crate::helpers::{git, TestRepo};
use anyhow::Result;
use release_pilot::git::{CheckoutGuard, ResetOnExit, StashGuard};
use std::panic::{catch_unwind, AssertUnwindSafe};

fn ok<T>(result: release_pilot::core::error::PilotResult<T>) -> Result<T> {
  result.map_err(|e| anyhow::anyhow!("{}", e))
}

#[test]
fn test_stash_guard_stashes_and_restores() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("README.md", "# Changed\n")?;
  repo.write("untracked.txt", "scratch\n")?;
  assert!(repo.is_dirty()?);

  let guard = ok(StashGuard::new(repo.system_git()?))?;
  assert!(!repo.is_dirty()?, "entry must leave a clean tree");
  assert!(repo.has_stash()?);

  ok(guard.restore())?;
  assert!(repo.is_dirty()?, "exit must bring the changes back");
  assert!(!repo.has_stash()?);
  assert_eq!(repo.read("untracked.txt")?, "scratch\n");
  Ok(())
}

#[test]
fn test_stash_guard_clean_tree_is_noop() -> Result<()> {
  let repo = TestRepo::new()?;
  assert!(!repo.is_dirty()?);

  let guard = ok(StashGuard::new(repo.system_git()?))?;
  assert!(!repo.has_stash()?, "clean entry must not stash");
  ok(guard.restore())?;
  assert!(!repo.is_dirty()?);
  assert!(!repo.has_stash()?);
  Ok(())
}

#[test]
fn test_stash_guard_pops_on_panic() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("README.md", "# Changed\n")?;
  let sys = repo.system_git()?;

  let result = catch_unwind(AssertUnwindSafe(|| {
    let _guard = StashGuard::new(sys.clone()).unwrap();
    panic!("stage blew up");
  }));
  assert!(result.is_err());

  assert!(repo.is_dirty()?, "unwind must still pop the stash");
  assert!(!repo.has_stash()?);
  Ok(())
}

#[test]
fn test_checkout_guard_switches_and_returns() -> Result<()> {
  let repo = TestRepo::new()?;
  git(&repo.path, &["branch", "work"])?;

  let guard = ok(CheckoutGuard::new(repo.system_git()?, "work"))?;
  assert_eq!(repo.current_branch()?, "work");
  ok(guard.restore())?;
  assert_eq!(repo.current_branch()?, "master");
  Ok(())
}

#[test]
fn test_checkout_guard_restores_on_drop() -> Result<()> {
  let repo = TestRepo::new()?;
  git(&repo.path, &["branch", "work"])?;

  {
    let _guard = ok(CheckoutGuard::new(repo.system_git()?, "work"))?;
    assert_eq!(repo.current_branch()?, "work");
    // Dropped without restore(), as on an error path.
  }
  assert_eq!(repo.current_branch()?, "master");
  Ok(())
}

#[test]
fn test_checkout_guards_nest() -> Result<()> {
  let repo = TestRepo::new()?;
  git(&repo.path, &["branch", "outer"])?;
  git(&repo.path, &["branch", "inner"])?;

  let first = ok(CheckoutGuard::new(repo.system_git()?, "outer"))?;
  let second = ok(CheckoutGuard::new(repo.system_git()?, "inner"))?;
  assert_eq!(repo.current_branch()?, "inner");

  ok(second.restore())?;
  assert_eq!(repo.current_branch()?, "outer");
  ok(first.restore())?;
  assert_eq!(repo.current_branch()?, "master");
  Ok(())
}

#[test]
fn test_checkout_guard_same_branch_is_noop() -> Result<()> {
  let repo = TestRepo::new()?;
  let guard = ok(CheckoutGuard::new(repo.system_git()?, "master"))?;
  assert_eq!(repo.current_branch()?, "master");
  ok(guard.restore())?;
  assert_eq!(repo.current_branch()?, "master");
  Ok(())
}

#[test]
fn test_reset_on_exit_discards_mutation() -> Result<()> {
  let repo = TestRepo::new()?;

  {
    let _reset = ResetOnExit::new(repo.system_git()?);
    repo.write("README.md", "# Mutated inside the block\n")?;
    assert!(repo.is_dirty()?);
  }
  assert!(!repo.is_dirty()?, "drop must hard-reset the tree");
  assert_eq!(repo.read("README.md")?, "# Test repo\n");
  Ok(())
}

#[test]
fn test_reset_on_exit_finish() -> Result<()> {
  let repo = TestRepo::new()?;
  let reset = ResetOnExit::new(repo.system_git()?);
  repo.write("README.md", "# Mutated\n")?;
  ok(reset.finish())?;
  assert!(!repo.is_dirty()?);
  Ok(())
}

#[test]
fn test_guards_compose_like_the_pipeline() -> Result<()> {
  // Stash, checkout, reset-on-exit: an error inside leaves the repo
  // exactly where it started.
  let repo = TestRepo::new()?;
  git(&repo.path, &["branch", "release-source"])?;
  repo.write("wip.txt", "work in progress\n")?;

  {
    let _stash = ok(StashGuard::new(repo.system_git()?))?;
    let _checkout = ok(CheckoutGuard::new(repo.system_git()?, "release-source"))?;
    let _reset = ResetOnExit::new(repo.system_git()?);
    repo.write("README.md", "# Half-done mutation\n")?;
    // All three dropped as on an error path (reverse order).
  }

  assert_eq!(repo.current_branch()?, "master");
  assert_eq!(repo.read("README.md")?, "# Test repo\n");
  assert_eq!(repo.read("wip.txt")?, "work in progress\n");
  assert!(!repo.has_stash()?);
  Ok(())
}
