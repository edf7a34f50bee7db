use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::{
    changes::{self, Annotator, ChangeEntry, ChangeStatus},
    config::Config,
    dot_history::DotHistory,
    error::{Error, Result},
    file_system::{FileSystem, LocalFileSystem},
    locks::WorkspaceLock,
    scanner::{self, FileMap},
    snapshot::{Snapshot, SnapshotSummary},
};

mod history;
mod publish;
mod restore;

pub use publish::CleanupReport;
pub use restore::Discard;

/// Name of the history directory inside a workspace.
pub const HISTORY_DIR: &str = ".history";

/// Called with every snapshot right after it is published. Failures are
/// logged and never affect the publish.
pub type PublishHook = Box<dyn Fn(&Snapshot) -> std::result::Result<(), String> + Send + Sync>;

/// The snapshot engine for one working directory.
pub struct Workspace<F = LocalFileSystem> {
    root: PathBuf,
    history: DotHistory,
    config: Config,
    fs: F,
    lock: WorkspaceLock,
    on_publish: Option<PublishHook>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Whether anything has been published yet.
    pub initialized: bool,
    pub snapshot_count: usize,
    pub last_snapshot: Option<SnapshotSummary>,
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub renamed: usize,
    pub folders_added: usize,
    pub folders_deleted: usize,
    pub has_changes: bool,
}

/// Baseline and working tree as of one scan.
struct Diff {
    baseline: FileMap,
    current: FileMap,
    files: Vec<ChangeEntry>,
}

impl Workspace<LocalFileSystem> {
    /// Opens the workspace at `root` with its history in `root/.history`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let history_root = root.join(HISTORY_DIR);
        Workspace::with_file_system(root, history_root, LocalFileSystem)
    }
}

impl<F: FileSystem> Workspace<F> {
    /// Opens a workspace whose history lives in `history_root`, reading the
    /// configuration stored there if there is one.
    pub fn with_file_system(root: PathBuf, history_root: PathBuf, fs: F) -> Result<Self> {
        let history = DotHistory::new(history_root);
        let config = history.config()?;
        let lock = WorkspaceLock::new(&root, history.root());
        let mut workspace = Workspace {
            root,
            history,
            config,
            fs,
            lock,
            on_publish: None,
        };
        workspace.ignore_history_dir();
        Ok(workspace)
    }

    /// Replaces the configuration for this handle. It is not persisted.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self.ignore_history_dir();
        self
    }

    pub fn on_publish(&mut self, hook: PublishHook) {
        self.on_publish = Some(hook);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn history_root(&self) -> &Path {
        self.history.root()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn save_config(&self) -> Result<()> {
        self.history.set_config(&self.config)
    }

    pub fn status(&self) -> Result<Status> {
        let initialized = self.history.baseline()?.is_some();
        let snapshots = self.history.snapshots()?;
        let diff = self.diff()?;
        let folders = changes::detect_folders(&diff.baseline, &diff.current);

        Ok(Status {
            initialized,
            snapshot_count: snapshots.len(),
            last_snapshot: snapshots.latest().map(SnapshotSummary::from),
            added: count(&diff.files, ChangeStatus::Added),
            modified: count(&diff.files, ChangeStatus::Modified),
            deleted: count(&diff.files, ChangeStatus::Deleted),
            renamed: count(&diff.files, ChangeStatus::Renamed),
            folders_added: count(&folders, ChangeStatus::Added),
            folders_deleted: count(&folders, ChangeStatus::Deleted),
            has_changes: !diff.files.is_empty(),
        })
    }

    /// Every changed file, sorted by path, followed by implied folder changes.
    pub fn changes(&self) -> Result<Vec<ChangeEntry>> {
        let mut diff = self.diff()?;
        self.annotate(&mut diff);
        let mut entries = diff.files;
        entries.extend(changes::detect_folders(&diff.baseline, &diff.current));
        Ok(entries)
    }

    pub fn snapshots(&self) -> Result<Vec<SnapshotSummary>> {
        Ok(self
            .history
            .snapshots()?
            .iter()
            .map(SnapshotSummary::from)
            .collect())
    }

    pub fn snapshot(&self, id: &str) -> Result<Snapshot> {
        let id = validate_id(id)?;
        self.history
            .snapshots()?
            .find(id)
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFound(id.to_string()))
    }

    fn diff(&self) -> Result<Diff> {
        let baseline = self.history.baseline()?.unwrap_or_default();
        let current = scanner::scan(&self.fs, &self.root, &self.config.ignores)?;
        let files = changes::detect_files(&baseline, &current);
        Ok(Diff {
            baseline,
            current,
            files,
        })
    }

    fn annotate(&self, diff: &mut Diff) {
        let blobs = self.history.blobs();
        Annotator {
            root: &self.root,
            fs: &self.fs,
            blobs: &blobs,
            baseline: &diff.baseline,
            text_extensions: &self.config.text_extensions,
        }
        .annotate(&mut diff.files);
    }

    fn project_name(&self) -> String {
        let canonical = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        canonical
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("workspace"))
    }

    /// Keeps the scanner out of a history directory that lives inside the
    /// workspace.
    fn ignore_history_dir(&mut self) {
        let inside = match self.history.root().strip_prefix(&self.root) {
            Ok(relative) => relative.components().next(),
            Err(_) => None,
        };
        if let Some(Component::Normal(name)) = inside {
            let name = name.to_string_lossy().into_owned();
            self.config.ignores = self.config.ignores.clone().with_dirs([name]);
        }
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            self.fs.create_dir_all(parent)?;
        }
        self.fs.write(&target, bytes)?;
        Ok(())
    }
}

fn count(entries: &[ChangeEntry], status: ChangeStatus) -> usize {
    entries.iter().filter(|e| e.status == status).count()
}

/// Checks a workspace-relative path and renders it with `/` separators.
fn normalize_path(input: &str) -> Result<String> {
    let invalid = || Error::InvalidArgument(format!("not a workspace path: {:?}", input));
    let unified = input.replace('\\', "/");
    let drive = unified.as_bytes().get(1) == Some(&b':');
    if unified.starts_with('/') || drive {
        return Err(invalid());
    }
    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" => continue,
            "." | ".." => return Err(invalid()),
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        return Err(invalid());
    }
    Ok(parts.join("/"))
}

fn validate_id(id: &str) -> Result<&str> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidArgument(format!("not a snapshot id: {:?}", id)));
    }
    Ok(id)
}

#[test]
fn test_normalize_path() {
    assert_eq!(normalize_path("draft.md").unwrap(), "draft.md");
    assert_eq!(normalize_path("book\\part 1\\ch.md").unwrap(), "book/part 1/ch.md");
    assert_eq!(normalize_path("book//ch.md/").unwrap(), "book/ch.md");
    assert_eq!(normalize_path("Chapter 1: Start.md").unwrap(), "Chapter 1: Start.md");
    for bad in ["", "/", "/etc/passwd", "../outside.md", "a/./b", "C:\\x", "a/../b"] {
        assert!(
            matches!(normalize_path(bad), Err(Error::InvalidArgument(_))),
            "{:?} should be rejected",
            bad
        );
    }
}

#[test]
fn test_validate_id() {
    assert!(validate_id("ab12cd34").is_ok());
    assert!(validate_id("").is_err());
    assert!(validate_id("../x").is_err());
}

#[test]
fn test_history_dir_inside_workspace_is_ignored() {
    let tempdir = tempfile::tempdir().unwrap();
    let root = tempdir.path().to_path_buf();
    let workspace =
        Workspace::with_file_system(root.clone(), root.join("versions"), LocalFileSystem).unwrap();
    assert!(workspace.config().ignores.ignores_dir("versions"));
}
