//! Git operations for manifest and project repositories
//!
//! Handles ls-remote, fetching and detached checkouts through libgit2, with
//! SSH key authentication support.

mod credentials;
mod operations;

pub use credentials::{GitCredentials, PrivateKey};
pub use operations::{commit_id, find_remote_ref, ls_remote, GitCheckout, RemoteRef};
