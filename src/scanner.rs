use std::{
    collections::BTreeMap,
    io,
    path::{Component, Path},
};

use crate::{file_hash::FileHash, file_system::FileSystem, ignores::Ignores};

/// Workspace-relative, forward-slash separated path to its content hash.
pub type FileMap = BTreeMap<String, FileHash>;

/// Renders a relative path with `/` separators whatever the host uses.
/// Returns `None` for paths that are not plain relative UTF-8 paths.
pub fn to_slash_path(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Hashes every tracked file under `root`.
///
/// A file that cannot be read is left out of the map with a warning; only a
/// failure to walk the root itself is an error.
pub fn scan<F: FileSystem>(fs: &F, root: &Path, ignores: &Ignores) -> io::Result<FileMap> {
    let mut state = FileMap::new();
    for relative in fs.walk(root, ignores)? {
        let key = match to_slash_path(&relative) {
            Some(key) => key,
            None => {
                log::warn!("skipping non UTF-8 path {:?}", relative);
                continue;
            }
        };
        match fs.read(&root.join(&relative)) {
            Ok(bytes) => {
                state.insert(key, FileHash::of(&bytes));
            }
            Err(err) => log::warn!("skipping unreadable file {}: {}", key, err),
        }
    }
    log::debug!("scanned {} files under {:?}", state.len(), root);
    Ok(state)
}

#[test]
fn test_scan() {
    use crate::file_system::LocalFileSystem;

    let tempdir = tempfile::tempdir().unwrap();
    let root = tempdir.path();
    std::fs::create_dir_all(root.join("part one")).unwrap();
    std::fs::write(root.join("part one/chapter.md"), "It was night.").unwrap();
    std::fs::write(root.join("draft.md"), "Hello world").unwrap();
    std::fs::create_dir_all(root.join(".history/content")).unwrap();
    std::fs::write(root.join(".history/baseline.json"), "{}").unwrap();

    let state = scan(&LocalFileSystem, root, &Ignores::default()).unwrap();
    let paths: Vec<&str> = state.keys().map(|k| k.as_str()).collect();
    assert_eq!(paths, vec!["draft.md", "part one/chapter.md"]);
    assert_eq!(state["draft.md"], FileHash::of(b"Hello world"));
}

#[test]
fn test_to_slash_path() {
    let nested: std::path::PathBuf = ["a", "b", "c.md"].iter().collect();
    assert_eq!(to_slash_path(&nested).as_deref(), Some("a/b/c.md"));
    assert_eq!(to_slash_path(Path::new("../x")), None);
    assert_eq!(to_slash_path(Path::new("")), None);
}
