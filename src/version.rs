//! Release version model
//!
//! Release identifiers look like `v1.2.3` for final releases and
//! `v1.2.3-rc.1` for release candidates. This is not quite semver (the `v`
//! prefix is mandatory, the patch component may be omitted on input), so
//! parsing and formatting are done here; the total order is lowered onto
//! `semver::Version`, which already ranks `1.2.3-rc.1 < 1.2.3` and compares
//! numeric pre-release identifiers numerically.

use crate::core::error::{PilotError, PilotResult, VersionError};
use std::cmp::Ordering;
use std::fmt;

/// A release version, ordered by (major, minor, patch) with release
/// candidates ranking strictly below their final release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
  pub major: u32,
  pub minor: u32,
  pub patch: u32,
  /// Release-candidate number; `None` means final release
  pub rc: Option<u32>,
}

impl Version {
  /// Parse `v<major>.<minor>[.<patch>][-rc.<rc>]`.
  ///
  /// A missing patch component defaults to 0. A missing rc suffix means a
  /// final release. Round-trips exactly with the `Display` form.
  pub fn parse(text: &str) -> PilotResult<Self> {
    let unparseable = || {
      PilotError::Version(VersionError::Unparseable {
        input: text.to_string(),
      })
    };

    let rest = text.strip_prefix('v').ok_or_else(unparseable)?;
    let (core, rc) = match rest.split_once("-rc.") {
      Some((core, rc)) => (core, Some(rc.parse::<u32>().map_err(|_| unparseable())?)),
      None => (rest, None),
    };

    let mut parts = core.split('.');
    let major = parts
      .next()
      .and_then(|p| p.parse::<u32>().ok())
      .ok_or_else(unparseable)?;
    let minor = parts
      .next()
      .and_then(|p| p.parse::<u32>().ok())
      .ok_or_else(unparseable)?;
    let patch = match parts.next() {
      Some(p) => p.parse::<u32>().map_err(|_| unparseable())?,
      None => 0,
    };
    if parts.next().is_some() {
      return Err(unparseable());
    }

    Ok(Self { major, minor, patch, rc })
  }

  /// Whether this is a release candidate
  pub fn is_rc(&self) -> bool {
    self.rc.is_some()
  }

  /// The final release this version belongs to (drops any rc suffix)
  pub fn final_release(self) -> Self {
    Self { rc: None, ..self }
  }

  /// The same release with a specific rc number
  pub fn with_rc(self, rc: u32) -> Self {
    Self { rc: Some(rc), ..self }
  }

  fn as_semver(&self) -> semver::Version {
    let mut version = semver::Version::new(
      u64::from(self.major),
      u64::from(self.minor),
      u64::from(self.patch),
    );
    if let Some(rc) = self.rc {
      version.pre =
        semver::Prerelease::new(&format!("rc.{}", rc)).unwrap_or(semver::Prerelease::EMPTY);
    }
    version
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    self.as_semver().cmp(&other.as_semver())
  }
}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
    if let Some(rc) = self.rc {
      write!(f, "-rc.{}", rc)?;
    }
    Ok(())
  }
}
