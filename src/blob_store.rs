use crate::file_hash::FileHash;

pub mod directory;
pub mod in_memory;

/// Write-once, content-addressed storage of raw file bytes.
///
/// Blobs are keyed by the [`FileHash`] of their own content, so a second
/// `put` under an existing hash is a no-op rather than an overwrite.
pub trait BlobStore {
    type Error;

    fn has(&self, hash: &FileHash) -> Result<bool, Self::Error>;

    /// Reads a blob, `Ok(None)` if no blob is stored under `hash`.
    fn get(&self, hash: &FileHash) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Stores `bytes` under `hash`. Callers must pass `FileHash::of(bytes)`.
    fn put(&mut self, hash: &FileHash, bytes: &[u8]) -> Result<(), Self::Error>;
}
