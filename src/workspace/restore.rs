use std::collections::BTreeSet;

use crate::{
    blob_store::{directory::DirectoryBlobStore, BlobStore},
    changes::ChangeStatus,
    error::{Error, Result},
    file_hash::FileHash,
    file_system::FileSystem,
    snapshot::SnapshotList,
};

use super::{history::record_content, normalize_path, validate_id, Workspace};

/// Which current changes to throw away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    All,
    /// Changed paths to revert. A rename is selected by either of its paths.
    Paths(Vec<String>),
}

impl<F: FileSystem> Workspace<F> {
    /// Overwrites `path` in the working tree with its content in snapshot
    /// `id`, returning the number of bytes written.
    pub fn restore_file(&self, id: &str, path: &str) -> Result<usize> {
        let id = validate_id(id)?;
        let path = normalize_path(path)?;
        let _guard = self.lock.acquire()?;

        let snapshots = self.history.snapshots()?;
        let hash = record_content(&snapshots, id, &path)?;
        let bytes = self
            .history
            .blobs()
            .get(&hash)?
            .ok_or_else(|| Error::BlobNotFound(hash.clone()))?;
        self.write_file(&path, &bytes)?;
        log::info!("restored {} from snapshot {}", path, id);
        Ok(bytes.len())
    }

    /// Reverts current changes to their most recently published state,
    /// returning how many paths were restored.
    ///
    /// Added files are removed. Everything else gets the content of the
    /// newest snapshot record that still has it, so a file untouched for
    /// several publishes is still found.
    pub fn discard(&self, target: Discard) -> Result<usize> {
        let selected = match target {
            Discard::All => None,
            Discard::Paths(paths) if paths.is_empty() => {
                return Err(Error::InvalidArgument(String::from("no paths to discard")));
            }
            Discard::Paths(paths) => Some(
                paths
                    .iter()
                    .map(|p| normalize_path(p))
                    .collect::<Result<BTreeSet<String>>>()?,
            ),
        };
        let _guard = self.lock.acquire()?;

        let diff = self.diff()?;
        let snapshots = self.history.snapshots()?;
        let blobs = self.history.blobs();
        let source = Source {
            snapshots: &snapshots,
            blobs: &blobs,
        };

        let mut restored = 0;
        for entry in &diff.files {
            if let Some(selected) = &selected {
                let by_previous = entry
                    .previous_path
                    .as_ref()
                    .map_or(false, |p| selected.contains(p));
                if !selected.contains(&entry.path) && !by_previous {
                    continue;
                }
            }
            let live = self.root.join(&entry.path);
            match entry.status {
                ChangeStatus::Added => {
                    if self.fs.exists(&live)? {
                        self.fs.remove_file(&live)?;
                        restored += 1;
                    }
                }
                ChangeStatus::Renamed => {
                    let previous = entry.previous_path.as_deref().unwrap_or(entry.path.as_str());
                    if let Some(bytes) = source.latest(previous, diff.baseline.get(previous))? {
                        self.write_file(previous, &bytes)?;
                        if previous != entry.path {
                            self.fs.remove_file(&live)?;
                        }
                        restored += 1;
                    }
                }
                ChangeStatus::Modified | ChangeStatus::Deleted => {
                    if let Some(bytes) = source.latest(&entry.path, diff.baseline.get(&entry.path))?
                    {
                        self.write_file(&entry.path, &bytes)?;
                        restored += 1;
                    }
                }
            }
        }
        log::info!("discarded changes to {} paths", restored);
        Ok(restored)
    }
}

/// Where discarded paths get their published content from.
struct Source<'a> {
    snapshots: &'a SnapshotList,
    blobs: &'a DirectoryBlobStore,
}

impl<'a> Source<'a> {
    /// The newest published content of `path`. Falls back to the baseline
    /// hash when retention dropped every snapshot that recorded it.
    fn latest(&self, path: &str, baseline: Option<&FileHash>) -> Result<Option<Vec<u8>>> {
        let hash = match self.snapshots.latest_content(path) {
            Some((_, hash)) => hash,
            None => match baseline {
                Some(hash) => hash,
                None => {
                    log::warn!("no published version of {} to restore", path);
                    return Ok(None);
                }
            },
        };
        let bytes = self.blobs.get(hash)?;
        if bytes.is_none() {
            log::warn!("blob {} for {} is missing", hash, path);
        }
        Ok(bytes)
    }
}
