use std::{
    collections::BTreeSet,
    fs,
    path::Path,
    process::Command,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use history::{
    changes::{ChangeEntry, ChangeStatus},
    locks::WorkspaceLock,
    snapshot::Snapshot,
    Discard, Error, ErrorKind, Workspace,
};
use tempfile::TempDir;

fn workspace() -> (TempDir, Workspace) {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::open(dir.path()).unwrap();
    (dir, workspace)
}

fn write(root: &Path, path: &str, content: &str) {
    let target = root.join(path);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(target, content).unwrap();
}

fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).unwrap()
}

fn files(entries: &[ChangeEntry]) -> Vec<(&str, ChangeStatus)> {
    entries
        .iter()
        .filter(|e| !e.is_folder)
        .map(|e| (e.path.as_str(), e.status))
        .collect()
}

fn blob_count(workspace: &Workspace) -> usize {
    fs::read_dir(workspace.history_root().join("content").join("blobs"))
        .unwrap()
        .count()
}

#[test]
fn test_draft_scenario() {
    let (dir, workspace) = workspace();
    let root = dir.path();
    write(root, "draft.md", "Hello world");
    workspace.publish(Some("v1")).unwrap();

    write(root, "draft.md", "Hello brave new world");
    let changes = workspace.changes().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "draft.md");
    assert_eq!(changes[0].status, ChangeStatus::Modified);
    assert_eq!((changes[0].added_words, changes[0].removed_words), (2, 0));
    let v2 = workspace.publish(Some("v2")).unwrap();
    assert_eq!((v2.added_words, v2.removed_words), (2, 0));

    fs::remove_file(root.join("draft.md")).unwrap();
    let changes = workspace.changes().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].status, ChangeStatus::Deleted);
    assert_eq!((changes[0].added_words, changes[0].removed_words), (0, 4));

    assert_eq!(workspace.discard(Discard::All).unwrap(), 1);
    assert_eq!(read(root, "draft.md"), "Hello brave new world");
    assert_eq!(workspace.discard(Discard::All).unwrap(), 0);
    assert!(workspace.changes().unwrap().is_empty());
}

#[test]
fn test_identical_files_share_one_blob() {
    let (dir, workspace) = workspace();
    write(dir.path(), "a.md", "same words");
    write(dir.path(), "b.md", "same words");
    let snapshot = workspace.publish(None).unwrap();
    assert_eq!(snapshot.files.len(), 2);
    assert_eq!(snapshot.files[0].content_hash, snapshot.files[1].content_hash);
    assert!(snapshot
        .files
        .iter()
        .all(|f| f.status == ChangeStatus::Added));
    assert_eq!(blob_count(&workspace), 1);
}

#[test]
fn test_rename_is_one_entry() {
    let (dir, workspace) = workspace();
    write(dir.path(), "a.md", "content nobody else has");
    workspace.publish(None).unwrap();

    fs::rename(dir.path().join("a.md"), dir.path().join("b.md")).unwrap();
    let changes = workspace.changes().unwrap();
    assert_eq!(files(&changes), vec![("b.md", ChangeStatus::Renamed)]);
    assert_eq!(changes[0].previous_path.as_deref(), Some("a.md"));
    assert_eq!((changes[0].added_words, changes[0].removed_words), (0, 0));

    let snapshot = workspace.publish(None).unwrap();
    assert_eq!(snapshot.files.len(), 1);
    assert_eq!(snapshot.files[0].previous_path.as_deref(), Some("a.md"));
}

#[test]
fn test_publish_then_restore_round_trip() {
    let (dir, workspace) = workspace();
    write(dir.path(), "chapters/one.md", "It was a dark and stormy night.");
    let snapshot = workspace.publish(None).unwrap();

    write(dir.path(), "chapters/one.md", "It was a bright morning.");
    let written = workspace.restore_file(&snapshot.id, "chapters/one.md").unwrap();
    assert_eq!(written, "It was a dark and stormy night.".len());
    assert_eq!(read(dir.path(), "chapters/one.md"), "It was a dark and stormy night.");

    fs::remove_dir_all(dir.path().join("chapters")).unwrap();
    workspace.restore_file(&snapshot.id, "chapters\\one.md").unwrap();
    assert_eq!(read(dir.path(), "chapters/one.md"), "It was a dark and stormy night.");
}

#[test]
fn test_cleanup_keeps_newest() {
    let (dir, workspace) = workspace();
    for i in 0..5 {
        write(dir.path(), "draft.md", &format!("revision {}", i));
        workspace.publish(Some(&format!("r{}", i))).unwrap();
    }
    let before: Vec<String> = workspace
        .snapshots()
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();

    let report = workspace.cleanup(2).unwrap();
    assert_eq!((report.removed, report.remaining), (3, 2));
    let after: Vec<String> = workspace
        .snapshots()
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(after, before[..2].to_vec());
    assert_eq!(workspace.snapshot(&after[0]).unwrap().name, "r4");

    for id in &after {
        assert!(workspace.snapshot_file(id, "draft.md").is_ok());
    }
    assert_eq!(blob_count(&workspace), 5);

    let report = workspace.cleanup(10).unwrap();
    assert_eq!((report.removed, report.remaining), (0, 2));
}

#[test]
fn test_discard_falls_back_to_baseline_after_cleanup() {
    let (dir, workspace) = workspace();
    write(dir.path(), "draft.md", "kept safe");
    workspace.publish(None).unwrap();
    assert_eq!(workspace.cleanup(0).unwrap().remaining, 0);

    write(dir.path(), "draft.md", "scribbled over");
    assert_eq!(workspace.discard(Discard::All).unwrap(), 1);
    assert_eq!(read(dir.path(), "draft.md"), "kept safe");
}

#[test]
fn test_discard_selected_paths() {
    let (dir, workspace) = workspace();
    write(dir.path(), "kept.md", "original");
    workspace.publish(None).unwrap();

    write(dir.path(), "kept.md", "edited");
    write(dir.path(), "notes/new.md", "brand new");
    assert_eq!(
        workspace
            .discard(Discard::Paths(vec!["notes/new.md".into()]))
            .unwrap(),
        1
    );
    assert!(!dir.path().join("notes/new.md").exists());
    assert_eq!(
        files(&workspace.changes().unwrap()),
        vec![("kept.md", ChangeStatus::Modified)]
    );

    let err = workspace.discard(Discard::Paths(vec![])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = workspace
        .discard(Discard::Paths(vec!["../kept.md".into()]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_discard_rename_restores_previous_path() {
    let (dir, workspace) = workspace();
    write(dir.path(), "old name.md", "the same text");
    workspace.publish(None).unwrap();
    fs::rename(dir.path().join("old name.md"), dir.path().join("new name.md")).unwrap();

    assert_eq!(
        workspace
            .discard(Discard::Paths(vec!["old name.md".into()]))
            .unwrap(),
        1
    );
    assert_eq!(read(dir.path(), "old name.md"), "the same text");
    assert!(!dir.path().join("new name.md").exists());
}

#[test]
fn test_discard_restores_file_untouched_for_several_publishes() {
    let (dir, workspace) = workspace();
    write(dir.path(), "early.md", "written first");
    workspace.publish(None).unwrap();
    for i in 0..3 {
        write(dir.path(), "other.md", &format!("churn {}", i));
        workspace.publish(None).unwrap();
    }
    fs::remove_file(dir.path().join("early.md")).unwrap();
    assert_eq!(workspace.discard(Discard::All).unwrap(), 1);
    assert_eq!(read(dir.path(), "early.md"), "written first");
}

#[test]
fn test_snapshot_file_errors_are_distinct() {
    let (dir, workspace) = workspace();
    write(dir.path(), "draft.md", "first");
    write(dir.path(), "doomed.md", "short lived");
    let v1 = workspace.publish(None).unwrap();
    fs::remove_file(dir.path().join("doomed.md")).unwrap();
    let v2 = workspace.publish(None).unwrap();

    assert_eq!(workspace.snapshot_file(&v1.id, "draft.md").unwrap(), b"first");
    assert!(matches!(
        workspace.snapshot_file("missing1", "draft.md"),
        Err(Error::SnapshotNotFound(_))
    ));
    assert!(matches!(
        workspace.snapshot_file(&v2.id, "draft.md"),
        Err(Error::PathNotInSnapshot { .. })
    ));
    assert!(matches!(
        workspace.snapshot_file(&v2.id, "doomed.md"),
        Err(Error::FileDeletedInSnapshot { .. })
    ));

    let hash = v1
        .files
        .iter()
        .find(|f| f.path == "draft.md")
        .and_then(|f| f.content_hash.clone())
        .unwrap();
    fs::remove_file(
        workspace
            .history_root()
            .join("content/blobs")
            .join(hash.as_str()),
    )
    .unwrap();
    assert!(matches!(
        workspace.snapshot_file(&v1.id, "draft.md"),
        Err(Error::BlobNotFound(_))
    ));
    assert!(matches!(
        workspace.restore_file(&v1.id, "draft.md"),
        Err(Error::BlobNotFound(_))
    ));
    assert!(matches!(
        workspace.snapshot_file("../etc", "draft.md"),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_publish_without_changes_fails() {
    let (dir, workspace) = workspace();
    assert!(matches!(workspace.publish(None), Err(Error::NoChanges)));
    write(dir.path(), "draft.md", "words");
    workspace.publish(None).unwrap();
    assert!(matches!(workspace.publish(None), Err(Error::NoChanges)));
    assert_eq!(workspace.snapshots().unwrap().len(), 1);
}

#[test]
fn test_default_name_uses_project() {
    let (dir, workspace) = workspace();
    write(dir.path(), "draft.md", "words");
    let snapshot = workspace.publish(Some("   ")).unwrap();
    let project = dir
        .path()
        .canonicalize()
        .unwrap()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(snapshot.name.starts_with(&format!("{}_", project)));
    assert_eq!(snapshot.id.len(), 8);
}

#[test]
fn test_delete_snapshot() {
    let (dir, workspace) = workspace();
    write(dir.path(), "draft.md", "words");
    let snapshot = workspace.publish(None).unwrap();
    assert!(workspace.delete_snapshot(&snapshot.id).unwrap());
    assert!(!workspace.delete_snapshot(&snapshot.id).unwrap());
    assert!(workspace.snapshots().unwrap().is_empty());
    assert_eq!(blob_count(&workspace), 1);
    assert!(matches!(
        workspace.snapshot(&snapshot.id),
        Err(Error::SnapshotNotFound(_))
    ));
}

#[test]
fn test_file_history() {
    let (dir, workspace) = workspace();
    write(dir.path(), "draft.md", "one");
    let v1 = workspace.publish(Some("v1")).unwrap();
    write(dir.path(), "other.md", "unrelated");
    workspace.publish(Some("v2")).unwrap();
    write(dir.path(), "draft.md", "one two");
    let v3 = workspace.publish(Some("v3")).unwrap();

    let history = workspace.file_history("draft.md").unwrap();
    let summary: Vec<(&str, &str, ChangeStatus)> = history
        .iter()
        .map(|h| (h.snapshot_id.as_str(), h.snapshot_name.as_str(), h.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            (v3.id.as_str(), "v3", ChangeStatus::Modified),
            (v1.id.as_str(), "v1", ChangeStatus::Added),
        ]
    );
    assert!(workspace.file_history("never.md").unwrap().is_empty());
}

#[test]
fn test_status_and_folders() {
    let (dir, workspace) = workspace();
    write(dir.path(), "book/ch1.md", "Call me Ishmael.");
    let status = workspace.status().unwrap();
    assert!(!status.initialized);
    assert_eq!((status.added, status.folders_added), (1, 1));
    assert!(status.has_changes);

    let changes = workspace.changes().unwrap();
    let folder = changes.iter().find(|e| e.is_folder).unwrap();
    assert_eq!((folder.path.as_str(), folder.status), ("book", ChangeStatus::Added));

    workspace.publish(Some("first")).unwrap();
    let status = workspace.status().unwrap();
    assert!(status.initialized);
    assert!(!status.has_changes);
    assert_eq!(status.snapshot_count, 1);
    assert_eq!(status.last_snapshot.unwrap().name, "first");

    fs::remove_dir_all(dir.path().join("book")).unwrap();
    let status = workspace.status().unwrap();
    assert_eq!((status.deleted, status.folders_deleted), (1, 1));
}

#[test]
fn test_ignored_paths_are_not_tracked() {
    let (dir, workspace) = workspace();
    write(dir.path(), "draft.md", "words");
    write(dir.path(), ".git/HEAD", "ref: refs/heads/main");
    write(dir.path(), "node_modules/x/index.js", "module.exports = 1");
    write(dir.path(), "tool.pyc", "bytecode");
    assert_eq!(
        files(&workspace.changes().unwrap()),
        vec![("draft.md", ChangeStatus::Added)]
    );
}

#[test]
fn test_publish_hook_failures_are_swallowed() {
    let (dir, mut workspace) = workspace();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    workspace.on_publish(Box::new(move |_snapshot: &Snapshot| {
        seen.fetch_add(1, Ordering::SeqCst);
        Err(String::from("tracker offline"))
    }));
    write(dir.path(), "draft.md", "words");
    workspace.publish(None).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    workspace.on_publish(Box::new(|_snapshot: &Snapshot| -> Result<(), String> {
        panic!("hook bug")
    }));
    write(dir.path(), "draft.md", "more words");
    workspace.publish(None).unwrap();
    assert_eq!(workspace.snapshots().unwrap().len(), 2);
}

#[test]
fn test_concurrent_publishes_do_not_both_record() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "draft.md", "contended");
    let root = dir.path().to_path_buf();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let root = root.clone();
            thread::spawn(move || Workspace::open(root).unwrap().publish(None))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(Error::NoChanges)))
            .count(),
        1
    );
    assert_eq!(Workspace::open(root).unwrap().snapshots().unwrap().len(), 1);
}

#[test]
fn test_history_outside_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    let workspace = Workspace::with_file_system(
        dir.path().to_path_buf(),
        store.path().join("history"),
        history::file_system::LocalFileSystem,
    )
    .unwrap();
    write(dir.path(), "draft.md", "words");
    workspace.publish(None).unwrap();
    assert!(store.path().join("history/snapshots.json").exists());
    assert!(store.path().join("history/baseline.json").exists());
    assert!(!dir.path().join(".history").exists());
}

#[test]
fn test_saved_config_is_loaded() {
    let (dir, workspace) = workspace();
    let mut config = workspace.config().clone();
    config.ignores = config.ignores.with_dirs(["scratch"]);
    let workspace = workspace.with_config(config);
    workspace.save_config().unwrap();

    let reopened = Workspace::open(dir.path()).unwrap();
    assert!(reopened.config().ignores.ignores_dir("scratch"));
    write(dir.path(), "scratch/todo.md", "ignored");
    write(dir.path(), "draft.md", "tracked");
    assert_eq!(
        files(&reopened.changes().unwrap()),
        vec![("draft.md", ChangeStatus::Added)]
    );
}

#[test]
fn test_default_names_stay_unique_after_delete() {
    let (dir, workspace) = workspace();
    let mut ids = vec![];
    for i in 0..3 {
        write(dir.path(), "draft.md", &format!("revision {}", i));
        ids.push(workspace.publish(None).unwrap().id);
    }
    assert!(workspace.delete_snapshot(&ids[1]).unwrap());
    write(dir.path(), "draft.md", "revision 3");
    workspace.publish(None).unwrap();

    let names: Vec<_> = workspace
        .snapshots()
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names.len(), 3);
    assert_eq!(names.iter().collect::<BTreeSet<_>>().len(), 3);
}

#[test]
fn test_publish_hook_can_call_back_into_engine() {
    let (dir, mut workspace) = workspace();
    let root = dir.path().to_path_buf();
    let deleted = Arc::new(AtomicBool::new(false));
    let flag = deleted.clone();
    workspace.on_publish(Box::new(move |snapshot: &Snapshot| {
        let removed = Workspace::open(&root)
            .and_then(|other| other.delete_snapshot(&snapshot.id))
            .map_err(|err| err.to_string())?;
        flag.store(removed, Ordering::SeqCst);
        Ok(())
    }));
    write(dir.path(), "draft.md", "words");
    workspace.publish(None).unwrap();
    assert!(deleted.load(Ordering::SeqCst));
    assert!(workspace.snapshots().unwrap().is_empty());
}

#[test]
fn test_cli_publish_waits_for_workspace_lock() {
    let (dir, workspace) = workspace();
    write(dir.path(), "draft.md", "words");
    let lock = WorkspaceLock::new(workspace.root(), workspace.history_root());
    let guard = lock.acquire().unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_histool"))
        .arg("publish")
        .current_dir(dir.path())
        .spawn()
        .unwrap();
    thread::sleep(Duration::from_millis(500));
    assert!(child.try_wait().unwrap().is_none());
    assert!(workspace.snapshots().unwrap().is_empty());

    drop(guard);
    assert!(child.wait().unwrap().success());
    assert_eq!(workspace.snapshots().unwrap().len(), 1);
}
