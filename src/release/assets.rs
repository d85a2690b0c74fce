//! Release asset effects: tarballs, detached signatures, digests
//!
//! Tarballs come from `git archive` plus the system `gzip`/`xz` tools;
//! signatures from `gpg`. Like the git facade, every external tool that
//! exits non-zero surfaces as a `CommandFailed` error with the command
//! line and status.

use crate::core::error::{GitError, PilotError, PilotResult, ResultExt};
use crate::git::SystemGit;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Asset suffixes that must carry a detached signature before publication
pub const SIGNABLE_SUFFIXES: &[&str] =
  &[".AppImage", ".apk", ".dmg", ".exe", ".flatpak", ".gz", ".xz"];

/// Whether an asset of this name is expected to have a signature
pub fn needs_signature(name: &str) -> bool {
  SIGNABLE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Whether an asset still needs signing given the full asset name list.
/// Sidecar files (`.asc`, `.sha256`) and already-signed assets are skipped.
pub fn needs_signing(name: &str, asset_names: &[String]) -> bool {
  !name.ends_with(".sha256")
    && !name.ends_with(".asc")
    && !asset_names.contains(&format!("{}.asc", name))
}

/// The source tarball names expected on a release of `tag`
pub fn tarball_names(tag: &str) -> [String; 2] {
  [format!("{}.tar.gz", tag), format!("{}.tar.xz", tag)]
}

/// Content type for an uploaded tarball or signature
pub fn content_type(name: &str) -> &'static str {
  if name.ends_with(".asc") {
    "application/pgp-signature"
  } else if name.ends_with(".gz") {
    "application/gzip"
  } else if name.ends_with(".xz") {
    "application/x-xz"
  } else {
    "application/octet-stream"
  }
}

/// Create `.tar.gz` and `.tar.xz` source tarballs for a tag in `dir`.
///
/// The archive tree is prefixed `<prefix>-<tag>/`. Returns the paths of
/// the compressed tarballs.
pub fn create_tarballs(
  git: &SystemGit,
  tag: &str,
  prefix: &str,
  dir: &Path,
) -> PilotResult<Vec<PathBuf>> {
  let mut outputs = Vec::new();
  for program in ["gzip", "xz"] {
    let tarname = dir.join(format!("{}.tar", tag));
    println!("Creating {} tarball for {}", program, tag);
    git.archive(tag, &format!("{}-{}", prefix, tag), &tarname)?;
    run_tool(program, &["-f", &tarname.display().to_string()])?;
    outputs.push(dir.join(format!("{}.tar.{}", tag, extension(program))));
  }
  Ok(outputs)
}

fn extension(program: &str) -> &str {
  match program {
    "gzip" => "gz",
    other => other,
  }
}

/// Create an armored detached signature next to `file` (`<file>.asc`)
pub fn sign_detached(file: &Path) -> PilotResult<PathBuf> {
  run_tool("gpg", &["--armor", "--detach-sign", &file.display().to_string()])?;
  let mut signature = file.as_os_str().to_owned();
  signature.push(".asc");
  Ok(PathBuf::from(signature))
}

/// Verify a detached signature over `file`
pub fn verify_signature(signature: &Path, file: &Path) -> PilotResult<()> {
  run_tool(
    "gpg",
    &[
      "--verify",
      &signature.display().to_string(),
      &file.display().to_string(),
    ],
  )
}

/// Hex-encoded SHA-256 digest of a byte buffer
pub fn sha256_hex(data: &[u8]) -> String {
  let digest = Sha256::digest(data);
  digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// Run an external tool, failing with the command line and status on a
/// non-zero exit.
fn run_tool(program: &str, args: &[&str]) -> PilotResult<()> {
  let output = Command::new(program)
    .args(args)
    .output()
    .with_context(|| format!("Failed to execute {}", program))?;

  if !output.status.success() {
    return Err(PilotError::Git(GitError::CommandFailed {
      command: format!("{} {}", program, args.join(" ")),
      status: output.status.code().unwrap_or(-1),
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }));
  }
  Ok(())
}
