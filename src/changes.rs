use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::Display,
    path::Path,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    blob_store::BlobStore,
    file_hash::FileHash,
    file_system::FileSystem,
    scanner::FileMap,
    words::{count_words, FileKind, WordDelta},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// How one path differs between the baseline and the working tree.
/// Recomputed on every request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub path: String,
    pub status: ChangeStatus,
    /// Current content hash, or the baseline hash for deleted files.
    /// Folders have none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<FileHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    pub added_words: usize,
    pub removed_words: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_folder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl ChangeEntry {
    fn file(path: &str, status: ChangeStatus, hash: &FileHash) -> Self {
        ChangeEntry {
            path: path.to_string(),
            status,
            hash: Some(hash.clone()),
            previous_path: None,
            added_words: 0,
            removed_words: 0,
            is_folder: false,
            modified_at: None,
        }
    }

    fn folder(path: &str, status: ChangeStatus) -> Self {
        ChangeEntry {
            path: path.to_string(),
            status,
            hash: None,
            previous_path: None,
            added_words: 0,
            removed_words: 0,
            is_folder: true,
            modified_at: None,
        }
    }
}

/// Classifies every file that differs between `baseline` and `current`.
///
/// An added file whose hash matches a deleted one becomes a single
/// `renamed` entry and the deleted entry is dropped. When several deleted
/// files share that hash only one of them is consumed; which one is
/// unspecified. Entries come back sorted by path.
pub fn detect_files(baseline: &FileMap, current: &FileMap) -> Vec<ChangeEntry> {
    let mut entries: BTreeMap<&str, ChangeEntry> = BTreeMap::new();
    let mut added = Vec::new();

    for (path, hash) in current {
        match baseline.get(path) {
            None => added.push((path.as_str(), hash)),
            Some(old) if old != hash => {
                entries.insert(path.as_str(), ChangeEntry::file(path, ChangeStatus::Modified, hash));
            }
            Some(_) => {}
        }
    }

    let mut deleted_by_hash: HashMap<&FileHash, &str> = HashMap::new();
    for (path, hash) in baseline {
        if !current.contains_key(path) {
            entries.insert(path.as_str(), ChangeEntry::file(path, ChangeStatus::Deleted, hash));
            deleted_by_hash.insert(hash, path.as_str());
        }
    }

    for (path, hash) in added {
        match deleted_by_hash.remove(hash) {
            Some(previous) => {
                entries.remove(previous);
                let mut entry = ChangeEntry::file(path, ChangeStatus::Renamed, hash);
                entry.previous_path = Some(previous.to_string());
                entries.insert(path, entry);
            }
            None => {
                entries.insert(path, ChangeEntry::file(path, ChangeStatus::Added, hash));
            }
        }
    }

    entries.into_values().collect()
}

fn folders(files: &FileMap) -> BTreeSet<&str> {
    let mut folders = BTreeSet::new();
    for path in files.keys() {
        for (i, _) in path.match_indices('/') {
            folders.insert(&path[..i]);
        }
    }
    folders
}

/// Folders implied by one file set and not the other.
pub fn detect_folders(baseline: &FileMap, current: &FileMap) -> Vec<ChangeEntry> {
    let before = folders(baseline);
    let after = folders(current);
    let added = after
        .difference(&before)
        .map(|f| ChangeEntry::folder(f, ChangeStatus::Added));
    let deleted = before
        .difference(&after)
        .map(|f| ChangeEntry::folder(f, ChangeStatus::Deleted));
    let mut entries: Vec<ChangeEntry> = added.chain(deleted).collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

/// Fills in word deltas and modification times for file entries.
///
/// Baseline word counts come from the blob the baseline hash addresses.
/// Any per-file failure is logged and counts as zero words.
pub struct Annotator<'a, F, B> {
    pub root: &'a Path,
    pub fs: &'a F,
    pub blobs: &'a B,
    pub baseline: &'a FileMap,
    pub text_extensions: &'a BTreeSet<String>,
}

impl<'a, F, B> Annotator<'a, F, B>
where
    F: FileSystem,
    B: BlobStore,
    B::Error: Display,
{
    pub fn annotate(&self, entries: &mut [ChangeEntry]) {
        for entry in entries.iter_mut().filter(|e| !e.is_folder) {
            if entry.status != ChangeStatus::Deleted {
                entry.modified_at = self
                    .fs
                    .modified(&self.root.join(&entry.path))
                    .ok()
                    .map(DateTime::<Utc>::from);
            }
            if FileKind::of(&entry.path, self.text_extensions) == FileKind::Binary {
                continue;
            }
            let delta = match entry.status {
                ChangeStatus::Added => WordDelta::between(0, self.current_words(&entry.path)),
                ChangeStatus::Deleted => WordDelta::between(self.baseline_words(&entry.path), 0),
                ChangeStatus::Modified => WordDelta::between(
                    self.baseline_words(&entry.path),
                    self.current_words(&entry.path),
                ),
                ChangeStatus::Renamed => WordDelta::default(),
            };
            entry.added_words = delta.added;
            entry.removed_words = delta.removed;
        }
    }

    fn current_words(&self, path: &str) -> usize {
        match self.fs.read(&self.root.join(path)) {
            Ok(bytes) => count_words(&bytes),
            Err(err) => {
                log::warn!("cannot count words in {}: {}", path, err);
                0
            }
        }
    }

    fn baseline_words(&self, path: &str) -> usize {
        let hash = match self.baseline.get(path) {
            Some(hash) => hash,
            None => return 0,
        };
        match self.blobs.get(hash) {
            Ok(Some(bytes)) => count_words(&bytes),
            Ok(None) => {
                log::debug!("no blob {} for {}", hash, path);
                0
            }
            Err(err) => {
                log::warn!("cannot count published words in {}: {}", path, err);
                0
            }
        }
    }
}

#[cfg(test)]
fn file_map(files: &[(&str, &str)]) -> FileMap {
    files
        .iter()
        .map(|(path, content)| (path.to_string(), FileHash::of(content.as_bytes())))
        .collect()
}

#[test]
fn test_detect_added_modified_deleted() {
    let baseline = file_map(&[("a.md", "alpha"), ("b.md", "beta"), ("c.md", "gamma")]);
    let current = file_map(&[("a.md", "alpha"), ("b.md", "beta two"), ("d.md", "delta")]);
    let entries = detect_files(&baseline, &current);
    let summary: Vec<(&str, ChangeStatus)> =
        entries.iter().map(|e| (e.path.as_str(), e.status)).collect();
    assert_eq!(
        summary,
        vec![
            ("b.md", ChangeStatus::Modified),
            ("c.md", ChangeStatus::Deleted),
            ("d.md", ChangeStatus::Added),
        ]
    );
    assert_eq!(entries[1].hash, Some(FileHash::of(b"gamma")));
}

#[test]
fn test_unchanged_files_never_appear() {
    let state = file_map(&[("a.md", "alpha"), ("dir/b.md", "beta")]);
    assert!(detect_files(&state, &state).is_empty());
    assert!(detect_folders(&state, &state).is_empty());
}

#[test]
fn test_detect_rename() {
    let baseline = file_map(&[("a.md", "unique words")]);
    let current = file_map(&[("b.md", "unique words")]);
    let entries = detect_files(&baseline, &current);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "b.md");
    assert_eq!(entries[0].status, ChangeStatus::Renamed);
    assert_eq!(entries[0].previous_path.as_deref(), Some("a.md"));
}

#[test]
fn test_detect_rename_with_one_duplicate() {
    let baseline = file_map(&[("a.md", "same"), ("b.md", "same")]);
    let current = file_map(&[("c.md", "same")]);
    let entries = detect_files(&baseline, &current);
    assert_eq!(entries.len(), 2);
    let renamed: Vec<&ChangeEntry> = entries
        .iter()
        .filter(|e| e.status == ChangeStatus::Renamed)
        .collect();
    let deleted: Vec<&ChangeEntry> = entries
        .iter()
        .filter(|e| e.status == ChangeStatus::Deleted)
        .collect();
    assert_eq!(renamed.len(), 1);
    assert_eq!(deleted.len(), 1);
    assert_eq!(renamed[0].path, "c.md");
    let previous = renamed[0].previous_path.as_deref().unwrap();
    assert!(previous == "a.md" || previous == "b.md");
    assert_ne!(previous, deleted[0].path);
}

#[test]
fn test_detect_folders() {
    let baseline = file_map(&[("old/notes.md", "n"), ("book/ch1.md", "one")]);
    let current = file_map(&[("book/ch1.md", "one"), ("book/part2/ch2.md", "two")]);
    let entries = detect_folders(&baseline, &current);
    let summary: Vec<(&str, ChangeStatus, bool)> = entries
        .iter()
        .map(|e| (e.path.as_str(), e.status, e.is_folder))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("book/part2", ChangeStatus::Added, true),
            ("old", ChangeStatus::Deleted, true),
        ]
    );
}

#[test]
fn test_annotate_words() {
    use crate::{blob_store::in_memory::InMemoryBlobStore, file_system::LocalFileSystem};

    let tempdir = tempfile::tempdir().unwrap();
    let root = tempdir.path();
    std::fs::write(root.join("draft.md"), "Hello brave new world").unwrap();
    std::fs::write(root.join("new.txt"), "three more words").unwrap();
    std::fs::write(root.join("cover.png"), "not words at all").unwrap();

    let mut blobs = InMemoryBlobStore::new();
    for content in ["Hello world", "gone but not forgotten", "old png"] {
        let hash = FileHash::of(content.as_bytes());
        blobs.put(&hash, content.as_bytes()).unwrap();
    }
    let baseline = file_map(&[
        ("draft.md", "Hello world"),
        ("gone.md", "gone but not forgotten"),
        ("cover.png", "old png"),
    ]);
    let current = file_map(&[
        ("draft.md", "Hello brave new world"),
        ("new.txt", "three more words"),
        ("cover.png", "not words at all"),
    ]);
    let text_extensions = crate::config::Config::default().text_extensions;
    let mut entries = detect_files(&baseline, &current);
    Annotator {
        root,
        fs: &LocalFileSystem,
        blobs: &blobs,
        baseline: &baseline,
        text_extensions: &text_extensions,
    }
    .annotate(&mut entries);

    let words: Vec<(&str, usize, usize)> = entries
        .iter()
        .map(|e| (e.path.as_str(), e.added_words, e.removed_words))
        .collect();
    assert_eq!(
        words,
        vec![
            ("cover.png", 0, 0),
            ("draft.md", 2, 0),
            ("gone.md", 0, 4),
            ("new.txt", 3, 0),
        ]
    );
    assert!(entries[1].modified_at.is_some());
    assert!(entries[2].modified_at.is_none());
}

#[test]
fn test_annotate_swallows_missing_content() {
    use crate::{blob_store::in_memory::InMemoryBlobStore, file_system::LocalFileSystem};

    let tempdir = tempfile::tempdir().unwrap();
    let baseline = file_map(&[("lost.md", "no blob was ever stored")]);
    let current = file_map(&[("vanished.md", "listed but unreadable")]);
    let text_extensions = crate::config::Config::default().text_extensions;
    let mut entries = detect_files(&baseline, &current);
    Annotator {
        root: tempdir.path(),
        fs: &LocalFileSystem,
        blobs: &InMemoryBlobStore::new(),
        baseline: &baseline,
        text_extensions: &text_extensions,
    }
    .annotate(&mut entries);
    assert!(entries
        .iter()
        .all(|e| e.added_words == 0 && e.removed_words == 0));
}
