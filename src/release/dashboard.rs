//! Progress dashboard rendering and parsing
//!
//! The dashboard is a fixed five-item checklist embedded in the tracking
//! issue body, starting at a fixed marker and running to the end of the
//! body. Everything in this module is pure text manipulation: rendering is
//! fully determined by its inputs and byte-identical on identical input,
//! and parsing recovers the progress a previous run persisted.

use crate::stage::ProgressState;
use std::collections::BTreeSet;

/// The dashboard begins at this heading inside the issue body
pub const DASHBOARD_MARKER: &str = "### Release progress";

/// Prefix of the failure banner appended after an escalated failure
pub const FAILURE_PREFIX: &str = "❌ **Failure:**";

const ACTION_PREFIX: &str = "> ℹ️ **Action Required:**";

/// Stage names and their checklist labels, in pipeline order.
pub const STAGES: [(&str, &str); 5] = [
  ("Preparation", "Create release branch and PR"),
  ("Review", "Approve and merge PR"),
  ("Tagging", "Tag and sign the release"),
  ("Binaries", "Build and sign binaries"),
  ("Publication", "Finalize release"),
];

/// Render the five-item checklist.
///
/// Done items are checked; the current stage (if any) becomes a highlighted
/// current-step line, followed by an action-required blockquote when an
/// action message is present. At most one item is ever the current step.
pub fn render_progress_list(
  done: &BTreeSet<String>,
  current: Option<&str>,
  action: Option<&str>,
) -> String {
  let mut out = String::new();
  for (name, label) in STAGES {
    if current == Some(name) {
      out.push_str(&format!("- [ ] **Current Step: {}**\n", label));
      if let Some(message) = action {
        out.push_str(&format!("{} {}\n", ACTION_PREFIX, message));
      }
    } else if done.contains(name) {
      out.push_str(&format!("- [x] {}\n", label));
    } else {
      out.push_str(&format!("- [ ] {}\n", label));
    }
  }
  out
}

/// Render the complete dashboard section: marker, checklist, and an
/// optional failure banner.
pub fn render_dashboard(progress: &ProgressState, failure: Option<&str>) -> String {
  let list = render_progress_list(progress.done(), progress.current(), progress.action_required());
  match failure {
    Some(banner) => format!("{}\n\n{}\n{}\n", DASHBOARD_MARKER, list, banner),
    None => format!("{}\n\n{}", DASHBOARD_MARKER, list),
  }
}

/// Format the failure banner line for an error message
pub fn failure_banner(message: &str) -> String {
  format!("{} {}", FAILURE_PREFIX, message)
}

/// Replace the dashboard section of an issue body, leaving everything
/// before the marker untouched. Bodies without a marker get the section
/// appended.
pub fn splice_dashboard(body: &str, section: &str) -> String {
  match body.find(DASHBOARD_MARKER) {
    Some(start) => format!("{}{}", &body[..start], section),
    None if body.trim().is_empty() => section.to_string(),
    None => format!("{}\n\n{}", body.trim_end(), section),
  }
}

/// Recover persisted progress from an issue body.
///
/// Unknown bodies (no marker, no checklist) parse as empty progress; a
/// fresh run then starts from the first stage.
pub fn parse_progress_list(body: &str) -> ProgressState {
  let section = match body.find(DASHBOARD_MARKER) {
    Some(start) => &body[start..],
    None => return ProgressState::default(),
  };

  let mut state = ProgressState::default();
  for (name, label) in STAGES {
    if section.contains(&format!("- [x] {}", label)) {
      state.mark_done(name);
    }
  }
  for (name, label) in STAGES {
    if section.contains(&format!("**Current Step: {}**", label)) {
      match extract_action(section) {
        Some(message) => state.require_action(name, message),
        None => state.mark_running(name),
      }
    }
  }
  state
}

fn extract_action(section: &str) -> Option<&str> {
  section
    .lines()
    .find_map(|line| line.strip_prefix(ACTION_PREFIX))
    .map(|rest| rest.trim())
}
