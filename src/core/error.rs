//! Error types for release-pilot with contextual messages and exit codes
//!
//! This module provides a unified error type that categorizes errors and
//! provides contextual help messages to users. The variants form a small
//! closed set with explicit propagation rules: `InvalidState` is always
//! fatal and bypasses failure escalation, `UserAbort` is the terminal
//! signal the escalation protocol ends with, and everything else is routed
//! through escalation before the process exits.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for release-pilot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, aborted run)
  User = 1,
  /// System error (git, network, I/O)
  System = 2,
  /// Validation failure (workflow precondition violated)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for release-pilot
#[derive(Debug)]
pub enum PilotError {
  /// Malformed release version text
  Version(VersionError),

  /// Git operation errors (wrapped external process failures)
  Git(GitError),

  /// GitHub API errors
  Api(ApiError),

  /// A workflow precondition was violated (stage run out of order,
  /// inconsistent dashboard). Never escalated; propagated directly.
  InvalidState(String),

  /// Terminal signal of the pipeline. Raised by the escalation protocol
  /// after a failure has been recorded on the tracking issue.
  UserAbort,

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl PilotError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    PilotError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    PilotError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Create an invalid-state error
  pub fn invalid_state(msg: impl Into<String>) -> Self {
    PilotError::InvalidState(msg.into())
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      PilotError::Message { message, context, help } => PilotError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      PilotError::Io(e) => PilotError::Message {
        message: format!("{}: {}", ctx_str, e),
        context: None,
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      PilotError::Version(_) => ExitCode::User,
      PilotError::Git(_) => ExitCode::System,
      PilotError::Api(_) => ExitCode::System,
      PilotError::InvalidState(_) => ExitCode::Validation,
      PilotError::UserAbort => ExitCode::User,
      PilotError::Io(_) => ExitCode::System,
      PilotError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      PilotError::Version(e) => e.help_message(),
      PilotError::Git(e) => e.help_message(),
      PilotError::Api(e) => e.help_message(),
      PilotError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for PilotError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PilotError::Version(e) => write!(f, "{}", e),
      PilotError::Git(e) => write!(f, "{}", e),
      PilotError::Api(e) => write!(f, "{}", e),
      PilotError::InvalidState(msg) => write!(f, "Invalid workflow state: {}", msg),
      PilotError::UserAbort => write!(f, "Aborted"),
      PilotError::Io(e) => write!(f, "I/O error: {}", e),
      PilotError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for PilotError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      PilotError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for PilotError {
  fn from(err: io::Error) -> Self {
    PilotError::Io(err)
  }
}

impl From<String> for PilotError {
  fn from(msg: String) -> Self {
    PilotError::message(msg)
  }
}

impl From<&str> for PilotError {
  fn from(msg: &str) -> Self {
    PilotError::message(msg)
  }
}

impl From<serde_json::Error> for PilotError {
  fn from(err: serde_json::Error) -> Self {
    PilotError::message(format!("JSON error: {}", err))
  }
}

impl From<reqwest::Error> for PilotError {
  fn from(err: reqwest::Error) -> Self {
    PilotError::Api(ApiError::Request { reason: err.to_string() })
  }
}

/// Version parsing errors
#[derive(Debug)]
pub enum VersionError {
  /// Text does not match `v<major>.<minor>[.<patch>][-rc.<rc>]`
  Unparseable { input: String },
}

impl VersionError {
  fn help_message(&self) -> Option<String> {
    match self {
      VersionError::Unparseable { .. } => {
        Some("Versions look like v1.2.3 or v1.2.3-rc.1 (the patch component may be omitted).".to_string())
      }
    }
  }
}

impl fmt::Display for VersionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VersionError::Unparseable { input } => {
        write!(f, "Could not parse version: {}", input)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git or another external command exited non-zero
  CommandFailed {
    command: String,
    status: i32,
    stderr: String,
  },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Push failed
  PushFailed {
    remote: String,
    branch: String,
    reason: String,
  },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } => {
        if reason.contains("non-fast-forward") {
          Some("The remote has commits you don't have. Pull first or re-run with --force.".to_string())
        } else if reason.contains("permission denied") || reason.contains("403") {
          Some("Check your SSH key permissions and GitHub access.".to_string())
        } else {
          None
        }
      }
      GitError::RepoNotFound { path } => Some(format!(
        "Run release-pilot from inside a git checkout, or check the path: {}",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, status, stderr } => {
        write!(f, "Command failed with status {}: {}\n{}", status, command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::PushFailed { remote, branch, reason } => {
        write!(f, "Push to {}/{} failed: {}", remote, branch, reason)
      }
    }
  }
}

/// GitHub API errors
#[derive(Debug)]
pub enum ApiError {
  /// Transport-level failure (connection, TLS, timeout)
  Request { reason: String },

  /// Non-success HTTP status
  Status { url: String, status: u16 },

  /// A write operation was attempted without a token
  MissingToken,
}

impl ApiError {
  fn help_message(&self) -> Option<String> {
    match self {
      ApiError::MissingToken => {
        Some("Set the GITHUB_TOKEN environment variable to authorize API writes.".to_string())
      }
      ApiError::Status { status: 403, .. } => {
        Some("Rate limited or forbidden. Set GITHUB_TOKEN to increase the rate limit.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for ApiError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ApiError::Request { reason } => write!(f, "GitHub API request failed: {}", reason),
      ApiError::Status { url, status } => {
        write!(f, "GitHub API returned {} for {}", status, url)
      }
      ApiError::MissingToken => write!(f, "GITHUB_TOKEN is needed for this operation"),
    }
  }
}

/// Result type alias for release-pilot
pub type PilotResult<T> = Result<T, PilotError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> PilotResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> PilotResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<PilotError>,
{
  fn context(self, ctx: impl Into<String>) -> PilotResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> PilotResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &PilotError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
