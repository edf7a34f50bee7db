use chrono::{DateTime, Local, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::{changes::ChangeStatus, file_hash::FileHash};

const ID_LEN: usize = 8;

/// A published, immutable record of what changed in the workspace.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Short random identifier, unique within the snapshot list.
    pub id: String,
    /// Human readable name, `<project>_<YYYYMMDD_HHmm>` unless given.
    pub name: String,
    pub published_at: DateTime<Utc>,
    /// The files that changed relative to the previous publish.
    pub files: Vec<SnapshotFile>,
    pub added_words: usize,
    pub removed_words: usize,
}

/// One changed path within a [`Snapshot`].
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub path: String,
    pub status: ChangeStatus,
    /// The blob holding the published content; absent for deleted files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<FileHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
}

impl SnapshotFile {
    /// The blob to restore this record from, if it carries content.
    pub fn content(&self) -> Option<&FileHash> {
        match self.status {
            ChangeStatus::Deleted => None,
            _ => self.content_hash.as_ref(),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub id: String,
    pub name: String,
    pub published_at: DateTime<Utc>,
    pub file_count: usize,
    pub added_words: usize,
    pub removed_words: usize,
}

impl From<&Snapshot> for SnapshotSummary {
    fn from(snapshot: &Snapshot) -> Self {
        SnapshotSummary {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            published_at: snapshot.published_at,
            file_count: snapshot.files.len(),
            added_words: snapshot.added_words,
            removed_words: snapshot.removed_words,
        }
    }
}

/// What happened to a path in one snapshot.
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHistoryEntry {
    pub snapshot_id: String,
    pub snapshot_name: String,
    pub published_at: DateTime<Utc>,
    pub status: ChangeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<FileHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
}

/// Every snapshot, newest first.
#[derive(PartialEq, Eq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotList(Vec<Snapshot>);

impl SnapshotList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.0.iter()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.0.first()
    }

    pub fn find(&self, id: &str) -> Option<&Snapshot> {
        self.0.iter().find(|s| s.id == id)
    }

    pub fn prepend(&mut self, snapshot: Snapshot) {
        self.0.insert(0, snapshot);
    }

    /// Keeps the `keep` newest snapshots, returning how many were dropped.
    pub fn truncate(&mut self, keep: usize) -> usize {
        let removed = self.0.len().saturating_sub(keep);
        self.0.truncate(keep);
        removed
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|s| s.id != id);
        self.0.len() != before
    }

    /// The newest record of `path` that still carries content, skipping
    /// snapshots that did not touch it and records that deleted it.
    pub fn latest_content(&self, path: &str) -> Option<(&Snapshot, &FileHash)> {
        self.0.iter().find_map(|snapshot| {
            snapshot
                .files
                .iter()
                .find(|f| f.path == path && f.content().is_some())
                .and_then(|f| f.content())
                .map(|hash| (snapshot, hash))
        })
    }

    pub fn history(&self, path: &str) -> Vec<FileHistoryEntry> {
        self.0
            .iter()
            .filter_map(|snapshot| {
                let file = snapshot.files.iter().find(|f| f.path == path)?;
                Some(FileHistoryEntry {
                    snapshot_id: snapshot.id.clone(),
                    snapshot_name: snapshot.name.clone(),
                    published_at: snapshot.published_at,
                    status: file.status,
                    content_hash: file.content_hash.clone(),
                    previous_path: file.previous_path.clone(),
                })
            })
            .collect()
    }

    /// `<project>_<YYYYMMDD_HHmm>`. When an existing name starts with that
    /// base, the smallest free `_<n>` suffix from 2 up is appended.
    pub fn default_name(&self, project: &str, now: DateTime<Local>) -> String {
        let base = format!("{}_{}", project, now.format("%Y%m%d_%H%M"));
        if !self.0.iter().any(|s| s.name.starts_with(&base)) {
            return base;
        }
        let taken = |name: &str| self.0.iter().any(|s| s.name == name);
        let mut n = 2;
        loop {
            let name = format!("{}_{}", base, n);
            if !taken(&name) {
                return name;
            }
            n += 1;
        }
    }
}

pub fn new_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
fn snapshot(id: &str, name: &str, files: Vec<SnapshotFile>) -> Snapshot {
    Snapshot {
        id: id.to_string(),
        name: name.to_string(),
        published_at: Utc::now(),
        files,
        added_words: 0,
        removed_words: 0,
    }
}

#[cfg(test)]
fn record(path: &str, status: ChangeStatus, content: Option<&str>) -> SnapshotFile {
    SnapshotFile {
        path: path.to_string(),
        status,
        content_hash: content.map(|c| FileHash::of(c.as_bytes())),
        previous_path: None,
    }
}

#[test]
fn test_list_is_newest_first() {
    let mut list = SnapshotList::default();
    list.prepend(snapshot("a", "first", vec![]));
    list.prepend(snapshot("b", "second", vec![]));
    assert_eq!(list.latest().map(|s| s.id.as_str()), Some("b"));
    let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[test]
fn test_truncate_and_remove() {
    let mut list = SnapshotList::default();
    for id in ["a", "b", "c", "d"] {
        list.prepend(snapshot(id, id, vec![]));
    }
    assert_eq!(list.truncate(10), 0);
    assert_eq!(list.truncate(2), 2);
    let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["d", "c"]);
    assert!(list.remove("c"));
    assert!(!list.remove("c"));
    assert_eq!(list.len(), 1);
}

#[test]
fn test_latest_content_skips_unrelated_and_deleted() {
    let mut list = SnapshotList::default();
    list.prepend(snapshot(
        "v1",
        "v1",
        vec![record("draft.md", ChangeStatus::Added, Some("one"))],
    ));
    list.prepend(snapshot(
        "v2",
        "v2",
        vec![record("other.md", ChangeStatus::Added, Some("other"))],
    ));
    list.prepend(snapshot(
        "v3",
        "v3",
        vec![record("draft.md", ChangeStatus::Deleted, None)],
    ));
    let (found, hash) = list.latest_content("draft.md").unwrap();
    assert_eq!(found.id, "v1");
    assert_eq!(hash, &FileHash::of(b"one"));
    assert!(list.latest_content("missing.md").is_none());
}

#[test]
fn test_history() {
    let mut list = SnapshotList::default();
    list.prepend(snapshot(
        "v1",
        "v1",
        vec![record("draft.md", ChangeStatus::Added, Some("one"))],
    ));
    list.prepend(snapshot("v2", "v2", vec![record("x.md", ChangeStatus::Added, Some("x"))]));
    list.prepend(snapshot(
        "v3",
        "v3",
        vec![record("draft.md", ChangeStatus::Modified, Some("two"))],
    ));
    let history = list.history("draft.md");
    let summary: Vec<(&str, ChangeStatus)> = history
        .iter()
        .map(|h| (h.snapshot_id.as_str(), h.status))
        .collect();
    assert_eq!(
        summary,
        vec![("v3", ChangeStatus::Modified), ("v1", ChangeStatus::Added)]
    );
}

#[test]
fn test_default_name_disambiguates() {
    use chrono::TimeZone;

    let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
    let mut list = SnapshotList::default();
    let first = list.default_name("novel", now);
    assert_eq!(first, "novel_20240309_1405");
    list.prepend(snapshot("a", &first, vec![]));
    let second = list.default_name("novel", now);
    assert_eq!(second, "novel_20240309_1405_2");
    list.prepend(snapshot("b", &second, vec![]));
    assert_eq!(list.default_name("novel", now), "novel_20240309_1405_3");
    list.prepend(snapshot("c", "novel_20240309_1405_3", vec![]));

    assert!(list.remove("b"));
    assert_eq!(list.default_name("novel", now), "novel_20240309_1405_2");
    assert!(list.remove("a"));
    assert_eq!(list.default_name("novel", now), "novel_20240309_1405_2");
    assert!(list.remove("c"));
    assert_eq!(list.default_name("novel", now), "novel_20240309_1405");
}

#[test]
fn test_new_id() {
    let id = new_id();
    assert_eq!(id.len(), ID_LEN);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
}

#[test]
fn test_snapshot_json_layout() {
    let snap = snapshot(
        "abc12345",
        "v1",
        vec![record("gone.md", ChangeStatus::Deleted, None)],
    );
    let json = serde_json::to_value(&snap).unwrap();
    assert!(json.get("publishedAt").is_some());
    assert_eq!(json["files"][0]["status"], "deleted");
    assert!(json["files"][0].get("contentHash").is_none());
    let back: Snapshot = serde_json::from_value(json).unwrap();
    assert_eq!(back, snap);
}
