//! Core building blocks for release-pilot
//!
//! - **config**: immutable run configuration built from the CLI
//! - **context**: repository root resolved once and passed everywhere
//! - **error**: error types with contextual help messages and exit codes

pub mod config;
pub mod context;
pub mod error;
