//! repo-resource - Android repo manifests as CI resource versions
//!
//! Tracks a manifest repository of the kind used by Google's `repo` tool.
//! Check turns the manifest into a pinned snapshot whose text is the
//! version; in checks every project of a version out into a directory.
//!
//! # Architecture
//!
//! - **manifest**: XML element tree, canonical versions, typed view, flattening
//! - **resolver**: versions emitted by check
//! - **syncer**: materialising one version (in)
//! - **metadata**: per-project build metadata
//! - **checkout**: the seam to the git collaborator
//! - **git**: libgit2 based checkout and SSH credentials
//! - **protocol**: JSON requests and responses
//! - **config**: process settings and source validation

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod protocol;
pub mod source;

// Operations
pub mod checkout;
pub mod git;
pub mod metadata;
pub mod resolver;
pub mod syncer;

// Re-exports
pub use error::{RepoResourceError, Result};
