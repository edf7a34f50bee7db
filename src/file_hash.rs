use crate::hex;

use serde::{Deserialize, Serialize};

use std::fmt::Display;

/// Number of digest bytes kept from the full [`blake3`] hash.
const DIGEST_BYTES: usize = 16;

/// Length of every [`FileHash`] in hexadecimal characters.
pub const HASH_LEN: usize = DIGEST_BYTES * 2;

/// A fingerprint for a particular piece of file content.
/// Under the hood, this is a truncated [`blake3`] hash.
///
/// It is displayed, serialized and used as a blob address in hexadecimal
/// format, always [`HASH_LEN`] characters long.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileHash(String);

impl FileHash {
    /// Hashes the given bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = blake3::hash(bytes);
        FileHash(hex::encode(&digest.as_bytes()[..DIGEST_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FileHash {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.len() != HASH_LEN || !hex::is_lower_hex(&s) {
            return Err(format!("not a file hash: {:?}", s));
        }
        Ok(FileHash(s))
    }
}

impl From<FileHash> for String {
    fn from(hash: FileHash) -> Self {
        hash.0
    }
}

#[test]
fn test_hash_is_stable() {
    let first = FileHash::of(b"Hello world");
    let second = FileHash::of(b"Hello world");
    assert_eq!(first, second);
    assert_eq!(first.as_str().len(), HASH_LEN);
    assert_ne!(first, FileHash::of(b"Hello brave new world"));
}

#[test]
fn test_hash_matches_blake3_prefix() {
    let full = blake3::hash(b"manuscript").to_hex();
    assert_eq!(FileHash::of(b"manuscript").as_str(), &full.as_str()[..HASH_LEN]);
}

#[test]
fn test_hash_deserialize() {
    let hash = FileHash::of(b"chapter one");
    let json = serde_json::to_string(&hash).unwrap();
    let hash_: FileHash = serde_json::from_str(&json).unwrap();
    assert_eq!(hash, hash_);

    assert!(serde_json::from_str::<FileHash>("\"not-a-hash\"").is_err());
    assert!(serde_json::from_str::<FileHash>("\"abc\"").is_err());
}
