//! # Workspace History
//!
//! Content-addressed snapshot history for a writer's working directory:
//! detect what changed since the last publish, publish it as a named
//! snapshot, and restore or discard changes against that history.

mod hex;

/// Write-once storage of file contents keyed by their [`file_hash::FileHash`].
pub mod blob_store;
/// Detection of added, modified, deleted and renamed paths.
pub mod changes;
/// Per-workspace settings.
pub mod config;
/// Documents kept in a workspace's history directory.
pub mod dot_history;
pub mod error;
/// Truncated content hashes.
pub mod file_hash;
/// The host's file-system capability.
pub mod file_system;
/// Rules for what the scanner skips.
pub mod ignores;
pub mod locks;
/// Walking and hashing the working tree.
pub mod scanner;
/// Published snapshots and their ordering.
pub mod snapshot;
/// Text/binary classification and word counts.
pub mod words;
/// The engine tying it all together.
pub mod workspace;

pub use error::{Error, ErrorKind, Result};
pub use workspace::{Discard, Workspace};
