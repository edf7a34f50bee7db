use std::panic::{self, AssertUnwindSafe};

use chrono::{Local, Utc};
use serde::Serialize;

use crate::{
    blob_store::BlobStore,
    changes::ChangeStatus,
    error::{Error, Result},
    file_hash::FileHash,
    file_system::FileSystem,
    snapshot::{new_id, Snapshot, SnapshotFile},
};

use super::{validate_id, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: usize,
    pub remaining: usize,
}

impl<F: FileSystem> Workspace<F> {
    /// Records every current change as a new snapshot and makes the scanned
    /// tree the new baseline.
    ///
    /// Blobs are written first, then the snapshot list, then the baseline.
    /// Dying before the list is written leaves only unreferenced blobs. Dying
    /// after it but before the baseline makes the next diff show the same
    /// changes again; publishing once more records them a second time and
    /// nothing is lost.
    pub fn publish(&self, name: Option<&str>) -> Result<Snapshot> {
        let snapshot = self.record(name)?;
        self.notify(&snapshot);
        Ok(snapshot)
    }

    /// The locked part of [`Workspace::publish`]. The hook runs after the
    /// lock is released so it may call back into the engine.
    fn record(&self, name: Option<&str>) -> Result<Snapshot> {
        let _guard = self.lock.acquire()?;

        let mut diff = self.diff()?;
        if diff.files.is_empty() {
            return Err(Error::NoChanges);
        }
        self.annotate(&mut diff);

        let mut blobs = self.history.blobs();
        let mut files = Vec::with_capacity(diff.files.len());
        let (mut added_words, mut removed_words) = (0, 0);
        for entry in &diff.files {
            let content_hash = match (entry.status, &entry.hash) {
                (ChangeStatus::Deleted, _) | (_, None) => None,
                (_, Some(expected)) => {
                    let bytes = self.fs.read(&self.root.join(&entry.path))?;
                    let actual = FileHash::of(&bytes);
                    if &actual != expected {
                        return Err(Error::HashMismatch {
                            path: entry.path.clone(),
                            expected: expected.clone(),
                            actual,
                        });
                    }
                    blobs.put(&actual, &bytes)?;
                    Some(actual)
                }
            };
            files.push(SnapshotFile {
                path: entry.path.clone(),
                status: entry.status,
                content_hash,
                previous_path: entry.previous_path.clone(),
            });
            added_words += entry.added_words;
            removed_words += entry.removed_words;
        }

        let mut snapshots = self.history.snapshots()?;
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => snapshots.default_name(&self.project_name(), Local::now()),
        };
        let snapshot = Snapshot {
            id: new_id(),
            name,
            published_at: Utc::now(),
            files,
            added_words,
            removed_words,
        };
        snapshots.prepend(snapshot.clone());
        self.history.set_snapshots(&snapshots)?;
        self.history.set_baseline(&diff.current)?;

        log::info!(
            "published {} ({}) with {} files, +{} -{} words",
            snapshot.name,
            snapshot.id,
            snapshot.files.len(),
            snapshot.added_words,
            snapshot.removed_words
        );
        Ok(snapshot)
    }

    /// Forgets a snapshot. Its blobs stay in the store.
    pub fn delete_snapshot(&self, id: &str) -> Result<bool> {
        let id = validate_id(id)?;
        let _guard = self.lock.acquire()?;

        let mut snapshots = self.history.snapshots()?;
        if !snapshots.remove(id) {
            return Ok(false);
        }
        self.history.set_snapshots(&snapshots)?;
        log::info!("deleted snapshot {}", id);
        Ok(true)
    }

    /// Keeps only the `keep` newest snapshots. Blobs are never removed, so
    /// content that retained snapshots refer to always survives.
    pub fn cleanup(&self, keep: usize) -> Result<CleanupReport> {
        let _guard = self.lock.acquire()?;

        let mut snapshots = self.history.snapshots()?;
        let removed = snapshots.truncate(keep);
        if removed > 0 {
            self.history.set_snapshots(&snapshots)?;
            log::info!("removed {} snapshots, kept {}", removed, snapshots.len());
        }
        Ok(CleanupReport {
            removed,
            remaining: snapshots.len(),
        })
    }

    fn notify(&self, snapshot: &Snapshot) {
        let hook = match &self.on_publish {
            Some(hook) => hook,
            None => return,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| hook(snapshot))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log::warn!("publish hook for {} failed: {}", snapshot.id, err),
            Err(_) => log::warn!("publish hook for {} panicked", snapshot.id),
        }
    }
}
