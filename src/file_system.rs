use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::SystemTime,
};

use walkdir::WalkDir;

use crate::ignores::Ignores;

/// The host's view of the working tree.
///
/// Everything the engine does to user files goes through this trait, so a
/// host can sandbox or instrument it.
pub trait FileSystem {
    /// Paths of the regular files under `root`, relative to it, skipping
    /// anything the [`Ignores`] rule out.
    fn walk(&self, root: &Path, ignores: &Ignores) -> io::Result<Vec<PathBuf>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> io::Result<bool>;

    fn modified(&self, path: &Path) -> io::Result<SystemTime>;
}

/// [`FileSystem`] backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn walk(&self, root: &Path, ignores: &Ignores) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry
                        .file_name()
                        .to_str()
                        .map_or(false, |name| ignores.ignores_dir(name))
            });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // The root itself being unreadable fails the whole scan.
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => {
                    log::warn!("skipping unreadable entry: {}", err);
                    continue;
                }
            };
            if !entry.file_type().is_file() || ignores.ignores_file(entry.path()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
        Ok(files)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::write(path, bytes)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }
}

#[test]
fn test_walk_skips_ignored() {
    let tempdir = tempfile::tempdir().unwrap();
    let root = tempdir.path();
    fs::create_dir_all(root.join("chapters")).unwrap();
    fs::create_dir_all(root.join(".git/objects")).unwrap();
    fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    fs::write(root.join("chapters/one.md"), "one").unwrap();
    fs::write(root.join("notes.txt"), "notes").unwrap();
    fs::write(root.join("cache.pyc"), [0u8, 1, 2]).unwrap();
    fs::write(root.join(".git/objects/x"), "x").unwrap();
    fs::write(root.join("node_modules/pkg/index.js"), "js").unwrap();

    let files = LocalFileSystem.walk(root, &Ignores::default()).unwrap();
    assert_eq!(
        files,
        vec![PathBuf::from("chapters/one.md"), PathBuf::from("notes.txt")]
    );
}

#[test]
fn test_walk_missing_root_fails() {
    let tempdir = tempfile::tempdir().unwrap();
    let missing = tempdir.path().join("missing");
    assert!(LocalFileSystem.walk(&missing, &Ignores::default()).is_err());
}
