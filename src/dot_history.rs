use std::{
    fs::{create_dir_all, File},
    io::{BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
    blob_store::directory::DirectoryBlobStore, config::Config, error::Result,
    scanner::FileMap, snapshot::SnapshotList,
};

const SNAPSHOTS: &str = "snapshots.json";
const BASELINE: &str = "baseline.json";
const CONFIG: &str = "config.json";

/// A wrapper for the path of a workspace's history directory which has a
/// number of utilities defined on it.
///
/// ```text
/// <history root>/
///   config.json
///   snapshots.json
///   baseline.json
///   content/blobs/<hash>
/// ```
///
/// Nothing is created until the first write, so a workspace that has never
/// published has no history directory at all.
#[derive(Debug, Clone)]
pub struct DotHistory {
    root: PathBuf,
}

impl DotHistory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blobs(&self) -> DirectoryBlobStore {
        DirectoryBlobStore::new(self.root.join("content").join("blobs"))
    }

    pub fn snapshots(&self) -> Result<SnapshotList> {
        Ok(read_json(&self.root.join(SNAPSHOTS))?.unwrap_or_default())
    }

    pub fn set_snapshots(&self, snapshots: &SnapshotList) -> Result<()> {
        write_json(snapshots, &self.root, SNAPSHOTS)
    }

    /// The baseline, or `None` before the first publish.
    pub fn baseline(&self) -> Result<Option<FileMap>> {
        read_json(&self.root.join(BASELINE))
    }

    pub fn set_baseline(&self, baseline: &FileMap) -> Result<()> {
        write_json(baseline, &self.root, BASELINE)
    }

    pub fn config(&self) -> Result<Config> {
        Ok(read_json(&self.root.join(CONFIG))?.unwrap_or_default())
    }

    pub fn set_config(&self, config: &Config) -> Result<()> {
        write_json(config, &self.root, CONFIG)
    }
}

/// Reads a JSON document, `Ok(None)` only if the file does not exist.
fn read_json<A: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<A>> {
    match File::options().read(true).open(path) {
        Ok(f) => Ok(Some(serde_json::from_reader(BufReader::new(f))?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Replaces `dir/name` with a pretty JSON document through a temporary file
/// in the same directory, so readers see either the old or the new version.
fn write_json<A: Serialize>(thing: &A, dir: &Path, name: &str) -> Result<()> {
    create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, thing)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|err| err.error)?;
    log::debug!("wrote {:?}", dir.join(name));
    Ok(())
}

#[test]
fn test_missing_documents_are_empty() {
    let tempdir = tempfile::tempdir().unwrap();
    let history = DotHistory::new(tempdir.path().join(".history"));
    assert!(history.snapshots().unwrap().is_empty());
    assert_eq!(history.baseline().unwrap(), None);
    assert_eq!(history.config().unwrap(), Config::default());
    assert!(!history.root().exists());
}

#[test]
fn test_baseline_is_replaced() {
    use crate::file_hash::FileHash;

    let tempdir = tempfile::tempdir().unwrap();
    let history = DotHistory::new(tempdir.path().join(".history"));
    let mut first = FileMap::new();
    first.insert("a.md".into(), FileHash::of(b"a"));
    first.insert("b.md".into(), FileHash::of(b"b"));
    history.set_baseline(&first).unwrap();

    let mut second = FileMap::new();
    second.insert("c.md".into(), FileHash::of(b"c"));
    history.set_baseline(&second).unwrap();
    assert_eq!(history.baseline().unwrap(), Some(second));

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(history.root().join(BASELINE)).unwrap()).unwrap();
    assert!(raw.is_object());
    assert_eq!(std::fs::read_dir(history.root()).unwrap().count(), 1);
}

#[test]
fn test_corrupt_document_is_fatal() {
    let tempdir = tempfile::tempdir().unwrap();
    let history = DotHistory::new(tempdir.path().to_path_buf());
    std::fs::write(tempdir.path().join(SNAPSHOTS), b"[{ truncated").unwrap();
    assert!(history.snapshots().is_err());
}
