use std::{
    fs::{create_dir_all, File},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::file_hash::FileHash;

use super::BlobStore;

/// A persistent [`BlobStore`] stored in a directory, with one file per
/// unique [`FileHash`] named by its hexadecimal digits and no extension.
///
/// The directory is only created once the first blob is written.
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, hash: &FileHash) -> PathBuf {
        self.root.join(hash.as_str())
    }
}

impl BlobStore for DirectoryBlobStore {
    type Error = std::io::Error;

    fn has(&self, hash: &FileHash) -> Result<bool, Self::Error> {
        self.path(hash).try_exists()
    }

    fn get(&self, hash: &FileHash) -> Result<Option<Vec<u8>>, Self::Error> {
        log::debug!("reading blob {} from {:?}", hash, self.root);
        match File::options().read(true).open(self.path(hash)) {
            Ok(mut f) => {
                let mut v = Vec::new();
                f.read_to_end(&mut v)?;
                if &FileHash::of(&v) != hash {
                    return Err(std::io::Error::new(
                        ErrorKind::InvalidData,
                        format!("blob {} is corrupt", hash),
                    ));
                }
                Ok(Some(v))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn put(&mut self, hash: &FileHash, bytes: &[u8]) -> Result<(), Self::Error> {
        debug_assert_eq!(hash, &FileHash::of(bytes));
        let path = self.path(hash);
        if path.try_exists()? {
            log::debug!("blob {} already stored", hash);
            return Ok(());
        }
        if !self.root.try_exists()? {
            log::info!("creating blob directory {:?}", self.root);
            create_dir_all(&self.root)?;
        }
        log::debug!("writing blob {} into {:?}", hash, self.root);
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }
}

#[test]
fn test_directory_blob_store() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryBlobStore::new(tempdir.path().join("content").join("blobs"));
    let b: &[u8] = b"hello, world";
    let hash = FileHash::of(b);
    assert!(!store.has(&hash).unwrap());
    assert_eq!(store.get(&hash).unwrap(), None);

    store.put(&hash, b).unwrap();
    assert!(store.has(&hash).unwrap());
    assert_eq!(store.get(&hash).unwrap(), Some(Vec::from(b)));
}

#[test]
fn test_directory_blob_store_put_twice_keeps_blob() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryBlobStore::new(tempdir.path().to_path_buf());
    let b: &[u8] = b"same words";
    let hash = FileHash::of(b);
    store.put(&hash, b).unwrap();
    store.put(&hash, b).unwrap();
    assert_eq!(store.get(&hash).unwrap(), Some(Vec::from(b)));
    assert_eq!(std::fs::read_dir(tempdir.path()).unwrap().count(), 1);
}

#[test]
fn test_directory_blob_store_detects_corruption() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryBlobStore::new(tempdir.path().to_path_buf());
    let hash = FileHash::of(b"original");
    store.put(&hash, b"original").unwrap();
    std::fs::write(tempdir.path().join(hash.as_str()), b"tampered").unwrap();
    let err = store.get(&hash).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}
