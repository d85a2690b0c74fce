//! release-pilot: resumable release orchestration driven from CI
//!
//! A release is a multi-step workflow (branch, human review, signed tag,
//! binaries, publication) that runs inside ephemeral CI jobs. The only
//! durable memory is a checklist dashboard embedded in a tracking issue:
//! every stage transition is persisted there, so a run can stop at any
//! point (or pause for out-of-band human action) and a later invocation
//! picks up where it left off. Scoped guards keep the local repository
//! consistent on every exit path.

pub mod changelog;
pub mod core;
pub mod git;
pub mod github;
pub mod release;
pub mod stage;
pub mod version;
