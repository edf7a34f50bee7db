//! Mutual exclusion for operations that rewrite a workspace's history.
//!
//! Every mutating engine call holds the lock for its workspace for its whole
//! duration. Threads of one process queue on a shared mutex; other processes
//! queue on an exclusive OS lock of `<history root>/lock`. Reads take no lock
//! and may observe a baseline that is being replaced.

use fs2::FileExt;
use parking_lot::{const_mutex, Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the lock file inside a history root.
pub const LOCK_FILE: &str = "lock";

static LOCKS: Mutex<BTreeMap<PathBuf, Arc<Mutex<()>>>> = const_mutex(BTreeMap::new());

/// The process-wide mutex for the workspace at `root`.
///
/// Different spellings of the same directory resolve to one lock as long as
/// the directory exists when this is called.
fn process_lock(root: &Path) -> Arc<Mutex<()>> {
    let key = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    LOCKS
        .lock()
        .entry(key)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// The lock guarding one workspace's history.
#[derive(Debug, Clone)]
pub struct WorkspaceLock {
    mutex: Arc<Mutex<()>>,
    path: PathBuf,
}

/// Held while a mutating operation runs. Dropping it releases the OS lock
/// and then the process mutex.
#[derive(Debug)]
pub struct LockGuard<'a> {
    file: File,
    _guard: MutexGuard<'a, ()>,
}

impl WorkspaceLock {
    pub fn new(root: &Path, history_root: &Path) -> Self {
        WorkspaceLock {
            mutex: process_lock(root),
            path: history_root.join(LOCK_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until this thread owns the workspace, creating the history root
    /// if needed.
    pub fn acquire(&self) -> io::Result<LockGuard<'_>> {
        let guard = self.mutex.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        log::debug!("locked {}", self.path.display());
        Ok(LockGuard {
            file,
            _guard: guard,
        })
    }
}

impl<'a> Drop for LockGuard<'a> {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            log::warn!("failed to release workspace lock: {}", err);
        }
    }
}

#[test]
fn test_same_root_same_mutex() {
    let tempdir = tempfile::tempdir().unwrap();
    let history = tempdir.path().join(".history");
    let a = WorkspaceLock::new(tempdir.path(), &history);
    let b = WorkspaceLock::new(&tempdir.path().join("."), &history);
    assert!(Arc::ptr_eq(&a.mutex, &b.mutex));

    let other = tempfile::tempdir().unwrap();
    let c = WorkspaceLock::new(other.path(), &other.path().join(".history"));
    assert!(!Arc::ptr_eq(&a.mutex, &c.mutex));
}

#[test]
fn test_acquire_creates_lock_file() {
    let tempdir = tempfile::tempdir().unwrap();
    let history = tempdir.path().join("nested").join(".history");
    let lock = WorkspaceLock::new(tempdir.path(), &history);
    {
        let _guard = lock.acquire().unwrap();
        assert!(history.join(LOCK_FILE).is_file());
    }
    // Released on drop, so it can be taken again.
    let _again = lock.acquire().unwrap();
}

#[test]
fn test_os_lock_is_exclusive() {
    let tempdir = tempfile::tempdir().unwrap();
    let lock = WorkspaceLock::new(tempdir.path(), tempdir.path());
    let guard = lock.acquire().unwrap();

    let other = OpenOptions::new().write(true).open(lock.path()).unwrap();
    assert!(other.try_lock_exclusive().is_err());
    drop(guard);
    assert!(other.try_lock_exclusive().is_ok());
    other.unlock().unwrap();
}

#[test]
fn test_lock_excludes_writers() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    let tempdir = tempfile::tempdir().unwrap();
    let root = tempdir.path().to_path_buf();
    let counter = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for _ in 0..5 {
        let root = root.clone();
        let counter = counter.clone();
        handles.push(thread::spawn(move || {
            let lock = WorkspaceLock::new(&root, &root.join(".history"));
            let _guard = lock.acquire().unwrap();
            let current = counter.load(Ordering::SeqCst);
            thread::yield_now();
            counter.store(current + 1, Ordering::SeqCst);
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}
