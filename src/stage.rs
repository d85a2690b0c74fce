//! Stage framework: named, skippable units of work with persisted progress
//!
//! A pipeline is a fixed, ordered slice of stages executed strictly in
//! sequence. Progress lives outside the process (persisted after every
//! transition), so a run can be killed between any two stages and resumed
//! by a later invocation without repeating completed work.

use crate::core::error::PilotResult;
use std::collections::BTreeSet;

/// Status of one stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
  Pending,
  Running,
  Done,
}

/// How a stage ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
  /// The stage finished its work; record it and move on
  Completed,
  /// The stage needs out-of-band action (e.g. a human approving a PR).
  /// The run stops here; a later invocation re-runs this stage.
  ActionRequired(String),
}

/// Result of driving a stage sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
  /// Every stage is done
  Completed,
  /// Stopped at a stage awaiting external action
  Paused,
}

/// One named unit of the pipeline. Immutable configuration, not state.
pub struct Stage<C> {
  /// Stable identifier recorded in the persisted done-set
  pub name: &'static str,
  /// Human-readable label shown on the dashboard
  pub label: &'static str,
  pub run: fn(&mut C) -> PilotResult<StageOutcome>,
}

/// The persisted progress of a pipeline run.
///
/// `done` only grows; `current` is the stage awaiting external action (or
/// mid-flight), `action_required` a short instruction for the human.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
  done: BTreeSet<String>,
  current: Option<String>,
  action_required: Option<String>,
}

impl ProgressState {
  pub fn new(done: BTreeSet<String>) -> Self {
    Self {
      done,
      current: None,
      action_required: None,
    }
  }

  pub fn is_done(&self, name: &str) -> bool {
    self.done.contains(name)
  }

  pub fn done(&self) -> &BTreeSet<String> {
    &self.done
  }

  pub fn current(&self) -> Option<&str> {
    self.current.as_deref()
  }

  pub fn action_required(&self) -> Option<&str> {
    self.action_required.as_deref()
  }

  pub fn status_of(&self, name: &str) -> StageStatus {
    if self.done.contains(name) {
      StageStatus::Done
    } else if self.current.as_deref() == Some(name) {
      StageStatus::Running
    } else {
      StageStatus::Pending
    }
  }

  pub fn mark_running(&mut self, name: &str) {
    self.current = Some(name.to_string());
    self.action_required = None;
  }

  pub fn mark_done(&mut self, name: &str) {
    self.done.insert(name.to_string());
    self.current = None;
    self.action_required = None;
  }

  pub fn require_action(&mut self, name: &str, message: &str) {
    self.current = Some(name.to_string());
    self.action_required = Some(message.to_string());
  }
}

/// Drives a stage sequence against persisted progress.
///
/// Implementors provide the progress storage; `run_stages` supplies the
/// sequencing, skip and pause semantics. Errors from stage bodies are
/// propagated untouched; translating them into the escalation protocol is
/// the caller's concern.
pub trait StageRunner: Sized {
  fn progress(&mut self) -> &mut ProgressState;

  /// Whether stages already recorded done should be skipped
  fn resume(&self) -> bool;

  /// Write the current progress to the external store. Called after every
  /// transition, never batched.
  fn persist_progress(&mut self) -> PilotResult<()>;

  fn run_stages(&mut self, stages: &[Stage<Self>]) -> PilotResult<RunOutcome> {
    for stage in stages {
      if self.resume() && self.progress().is_done(stage.name) {
        println!("✓ {} (already done)", stage.label);
        continue;
      }

      self.progress().mark_running(stage.name);
      self.persist_progress()?;
      println!("▶ {}", stage.label);

      match (stage.run)(self)? {
        StageOutcome::Completed => {
          self.progress().mark_done(stage.name);
          self.persist_progress()?;
          println!("✓ {}", stage.label);
        }
        StageOutcome::ActionRequired(message) => {
          self.progress().require_action(stage.name, &message);
          self.persist_progress()?;
          println!("⏸ {}: {}", stage.label, message);
          return Ok(RunOutcome::Paused);
        }
      }
    }
    Ok(RunOutcome::Completed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::error::PilotError;

  /// Test pipeline recording every persisted snapshot.
  struct Pipeline {
    progress: ProgressState,
    resume: bool,
    persisted: Vec<ProgressState>,
    executed: Vec<&'static str>,
  }

  impl Pipeline {
    fn new(resume: bool) -> Self {
      Self {
        progress: ProgressState::default(),
        resume,
        persisted: Vec::new(),
        executed: Vec::new(),
      }
    }
  }

  impl StageRunner for Pipeline {
    fn progress(&mut self) -> &mut ProgressState {
      &mut self.progress
    }

    fn resume(&self) -> bool {
      self.resume
    }

    fn persist_progress(&mut self) -> PilotResult<()> {
      self.persisted.push(self.progress.clone());
      Ok(())
    }
  }

  fn ok_first(p: &mut Pipeline) -> PilotResult<StageOutcome> {
    p.executed.push("first");
    Ok(StageOutcome::Completed)
  }

  fn ok_second(p: &mut Pipeline) -> PilotResult<StageOutcome> {
    p.executed.push("second");
    Ok(StageOutcome::Completed)
  }

  fn pauses(p: &mut Pipeline) -> PilotResult<StageOutcome> {
    p.executed.push("pauses");
    Ok(StageOutcome::ActionRequired("Please approve PR".to_string()))
  }

  fn fails(p: &mut Pipeline) -> PilotResult<StageOutcome> {
    p.executed.push("fails");
    Err(PilotError::message("network down"))
  }

  const FIRST: Stage<Pipeline> = Stage {
    name: "First",
    label: "First stage",
    run: ok_first,
  };
  const SECOND: Stage<Pipeline> = Stage {
    name: "Second",
    label: "Second stage",
    run: ok_second,
  };

  #[test]
  fn test_all_stages_complete_in_order() {
    let mut pipeline = Pipeline::new(false);
    let outcome = pipeline.run_stages(&[FIRST, SECOND]).unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(pipeline.executed, vec!["first", "second"]);
    assert!(pipeline.progress.is_done("First"));
    assert!(pipeline.progress.is_done("Second"));
    assert_eq!(pipeline.progress.current(), None);
  }

  #[test]
  fn test_persists_after_every_transition() {
    let mut pipeline = Pipeline::new(false);
    pipeline.run_stages(&[FIRST, SECOND]).unwrap();
    // running, done, running, done
    assert_eq!(pipeline.persisted.len(), 4);
    assert_eq!(pipeline.persisted[0].current(), Some("First"));
    assert!(pipeline.persisted[1].is_done("First"));
    assert_eq!(pipeline.persisted[1].current(), None);
  }

  #[test]
  fn test_resume_skips_done_stages() {
    let mut pipeline = Pipeline::new(true);
    pipeline.progress.mark_done("First");
    pipeline.run_stages(&[FIRST, SECOND]).unwrap();
    assert_eq!(pipeline.executed, vec!["second"]);
  }

  #[test]
  fn test_without_resume_done_stages_run_again() {
    let mut pipeline = Pipeline::new(false);
    pipeline.progress.mark_done("First");
    pipeline.run_stages(&[FIRST, SECOND]).unwrap();
    assert_eq!(pipeline.executed, vec!["first", "second"]);
  }

  #[test]
  fn test_action_required_pauses_run() {
    const PAUSING: Stage<Pipeline> = Stage {
      name: "Gate",
      label: "Gate stage",
      run: pauses,
    };
    let mut pipeline = Pipeline::new(false);
    let outcome = pipeline.run_stages(&[FIRST, PAUSING, SECOND]).unwrap();
    assert_eq!(outcome, RunOutcome::Paused);
    assert_eq!(pipeline.executed, vec!["first", "pauses"]);
    assert!(!pipeline.progress.is_done("Gate"));
    assert_eq!(pipeline.progress.current(), Some("Gate"));
    assert_eq!(pipeline.progress.action_required(), Some("Please approve PR"));
  }

  #[test]
  fn test_error_propagates_without_marking_done() {
    const FAILING: Stage<Pipeline> = Stage {
      name: "Broken",
      label: "Broken stage",
      run: fails,
    };
    let mut pipeline = Pipeline::new(false);
    let err = pipeline.run_stages(&[FIRST, FAILING, SECOND]).unwrap_err();
    assert!(err.to_string().contains("network down"));
    assert!(pipeline.progress.is_done("First"));
    assert!(!pipeline.progress.is_done("Broken"));
    assert_eq!(pipeline.executed, vec!["first", "fails"]);
  }

  #[test]
  fn test_status_of() {
    let mut progress = ProgressState::default();
    assert_eq!(progress.status_of("First"), StageStatus::Pending);
    progress.mark_running("First");
    assert_eq!(progress.status_of("First"), StageStatus::Running);
    progress.mark_done("First");
    assert_eq!(progress.status_of("First"), StageStatus::Done);
  }
}
