use crate::{
    blob_store::BlobStore,
    error::{Error, Result},
    file_hash::FileHash,
    file_system::FileSystem,
    snapshot::{FileHistoryEntry, SnapshotList},
};

use super::{normalize_path, validate_id, Workspace};

impl<F: FileSystem> Workspace<F> {
    /// Every snapshot that recorded `path`, newest first.
    pub fn file_history(&self, path: &str) -> Result<Vec<FileHistoryEntry>> {
        let path = normalize_path(path)?;
        Ok(self.history.snapshots()?.history(&path))
    }

    /// The content `path` had in snapshot `id`.
    pub fn snapshot_file(&self, id: &str, path: &str) -> Result<Vec<u8>> {
        let id = validate_id(id)?;
        let path = normalize_path(path)?;
        let snapshots = self.history.snapshots()?;
        let hash = record_content(&snapshots, id, &path)?;
        self.history
            .blobs()
            .get(&hash)?
            .ok_or(Error::BlobNotFound(hash))
    }
}

/// Resolves snapshot `id` and its record for `path` to a blob address,
/// reporting each way that can fail separately.
pub(super) fn record_content(snapshots: &SnapshotList, id: &str, path: &str) -> Result<FileHash> {
    let snapshot = snapshots
        .find(id)
        .ok_or_else(|| Error::SnapshotNotFound(id.to_string()))?;
    let record = snapshot
        .files
        .iter()
        .find(|f| f.path == path)
        .ok_or_else(|| Error::PathNotInSnapshot {
            snapshot: id.to_string(),
            path: path.to_string(),
        })?;
    record
        .content()
        .cloned()
        .ok_or_else(|| Error::FileDeletedInSnapshot {
            snapshot: id.to_string(),
            path: path.to_string(),
        })
}
