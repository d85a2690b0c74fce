//! Release notes lookup in CHANGELOG.md
//!
//! The changelog is a hand-maintained markdown file with one `## vX.Y.Z`
//! heading per release. A section runs until the next version heading, a
//! `####` subsection marker, or an `<a name=` anchor line.

use crate::core::error::PilotResult;
use crate::version::Version;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_LOGFILE: &str = "CHANGELOG.md";

/// Parsed changelog: release notes keyed by version string.
#[derive(Debug, Clone, Default)]
pub struct Changelog {
  notes: BTreeMap<String, String>,
}

impl Changelog {
  /// Load and parse `CHANGELOG.md` from the repository root.
  pub fn load(root: &Path) -> PilotResult<Self> {
    let text = std::fs::read_to_string(root.join(DEFAULT_LOGFILE))?;
    Ok(Self::parse(&text))
  }

  /// Parse changelog text into per-version sections.
  pub fn parse(text: &str) -> Self {
    let mut notes = BTreeMap::new();
    let mut version: Option<String> = None;
    let mut section: Vec<&str> = Vec::new();

    for line in text.lines() {
      if let Some(heading) = version_heading(line) {
        if let Some(previous) = version.take() {
          insert(&mut notes, previous, &section);
        }
        version = Some(heading.to_string());
        section.clear();
        continue;
      }
      if version.is_some() {
        if line.starts_with("####") || line.starts_with("<a name=") {
          if let Some(previous) = version.take() {
            insert(&mut notes, previous, &section);
          }
          section.clear();
        } else {
          section.push(line);
        }
      }
    }
    if let Some(previous) = version {
      insert(&mut notes, previous, &section);
    }

    Self { notes }
  }

  /// The notes recorded for a version, if any
  pub fn release_notes(&self, version: &Version) -> Option<&str> {
    self.notes.get(&version.to_string()).map(|s| s.as_str())
  }

  pub fn has_release_notes(&self, version: &Version) -> bool {
    self.release_notes(version).is_some()
  }
}

/// Extract the version token from a `## vX.Y.Z` heading line
fn version_heading(line: &str) -> Option<&str> {
  let rest = line.strip_prefix("##")?;
  if rest.starts_with('#') {
    return None;
  }
  let token = rest.trim_start().split_whitespace().next()?;
  token.starts_with('v').then_some(token)
}

fn insert(notes: &mut BTreeMap<String, String>, version: String, section: &[&str]) {
  let mut lines = section;
  while let Some((last, rest)) = lines.split_last() {
    if last.trim().is_empty() {
      lines = rest;
    } else {
      break;
    }
  }
  while let Some((first, rest)) = lines.split_first() {
    if first.trim().is_empty() {
      lines = rest;
    } else {
      break;
    }
  }
  notes.insert(version, lines.join("\n"));
}
