use std::{collections::BTreeMap, convert::Infallible};

use crate::file_hash::FileHash;

use super::BlobStore;

#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: BTreeMap<FileHash, Vec<u8>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    type Error = Infallible;

    fn has(&self, hash: &FileHash) -> Result<bool, Self::Error> {
        Ok(self.blobs.contains_key(hash))
    }

    fn get(&self, hash: &FileHash) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.blobs.get(hash).cloned())
    }

    fn put(&mut self, hash: &FileHash, bytes: &[u8]) -> Result<(), Self::Error> {
        debug_assert_eq!(hash, &FileHash::of(bytes));
        self.blobs
            .entry(hash.clone())
            .or_insert_with(|| Vec::from(bytes));
        Ok(())
    }
}

#[test]
fn test_in_memory_blob_store() {
    let mut store = InMemoryBlobStore::new();
    let b: &[u8] = b"hello, world";
    let hash = FileHash::of(b);
    store.put(&hash, b).unwrap();
    store.put(&hash, b).unwrap();
    assert!(store.has(&hash).unwrap());
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&hash).unwrap(), Some(Vec::from(b)));
    assert_eq!(store.get(&FileHash::of(b"other")).unwrap(), None);
}
