use derive_more::{Display, From};

use crate::file_hash::FileHash;

#[derive(Debug, Display, From)]
pub enum Error {
    #[display(fmt = "snapshot {} not found", _0)]
    SnapshotNotFound(String),
    #[display(fmt = "{} is not part of snapshot {}", path, snapshot)]
    PathNotInSnapshot { snapshot: String, path: String },
    #[display(fmt = "{} was deleted in snapshot {}", path, snapshot)]
    FileDeletedInSnapshot { snapshot: String, path: String },
    #[display(fmt = "blob {} is missing", _0)]
    BlobNotFound(FileHash),
    #[display(fmt = "nothing to publish")]
    NoChanges,
    #[display(fmt = "invalid argument: {}", _0)]
    InvalidArgument(String),
    /// The file changed between computing the diff and storing it.
    #[display(fmt = "{} changed while publishing", path)]
    HashMismatch {
        path: String,
        expected: FileHash,
        actual: FileHash,
    },
    #[from]
    #[display(fmt = "i/o failure: {}", _0)]
    IO(std::io::Error),
    #[from]
    #[display(fmt = "malformed history document: {}", _0)]
    Serde(serde_json::Error),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IO(err) => Some(err),
            Error::Serde(err) => Some(err),
            _ => None,
        }
    }
}

/// The coarse categories callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NoChanges,
    InvalidArgument,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SnapshotNotFound(_)
            | Error::PathNotInSnapshot { .. }
            | Error::FileDeletedInSnapshot { .. }
            | Error::BlobNotFound(_) => ErrorKind::NotFound,
            Error::NoChanges => ErrorKind::NoChanges,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::HashMismatch { .. } | Error::IO(_) | Error::Serde(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[test]
fn test_kinds_stay_distinct() {
    let not_found = Error::PathNotInSnapshot {
        snapshot: "abc".into(),
        path: "draft.md".into(),
    };
    assert_eq!(not_found.kind(), ErrorKind::NotFound);
    assert_eq!(
        not_found.to_string(),
        "draft.md is not part of snapshot abc"
    );
    let io: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
    assert_eq!(io.kind(), ErrorKind::Io);
    assert_eq!(Error::NoChanges.kind(), ErrorKind::NoChanges);
}
