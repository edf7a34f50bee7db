use std::{collections::BTreeSet, path::Path};

use serde::{Deserialize, Serialize};

const DEFAULT_DIRS: &[&str] = &[
    ".history",
    ".git",
    ".hg",
    ".svn",
    ".bzr",
    "node_modules",
    "bower_components",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".gradle",
    ".idea",
    "dist",
    "build",
];

const DEFAULT_EXTENSIONS: &[&str] = &[
    "pyc", "pyo", "class", "o", "obj", "so", "dll", "dylib", "exe", "a", "lib", "wasm",
];

/// Names of directories that are never descended into and extensions of
/// files that are never tracked.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Ignores {
    dirs: BTreeSet<String>,
    extensions: BTreeSet<String>,
}

impl Default for Ignores {
    fn default() -> Self {
        Ignores {
            dirs: DEFAULT_DIRS.iter().map(|s| s.to_string()).collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Ignores {
    pub fn empty() -> Self {
        Ignores {
            dirs: BTreeSet::new(),
            extensions: BTreeSet::new(),
        }
    }

    pub fn with_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Extensions are matched case-insensitively and without the leading dot.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(
            extensions
                .into_iter()
                .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase()),
        );
        self
    }

    pub fn ignores_dir(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }

    pub fn ignores_file(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.contains(&ext.to_ascii_lowercase()),
            None => false,
        }
    }
}

#[test]
fn test_default_ignores() {
    let ignores = Ignores::default();
    assert!(ignores.ignores_dir(".git"));
    assert!(ignores.ignores_dir("node_modules"));
    assert!(ignores.ignores_dir(".history"));
    assert!(!ignores.ignores_dir("chapters"));
    assert!(ignores.ignores_file(Path::new("build/module.PYC")));
    assert!(!ignores.ignores_file(Path::new("draft.md")));
    assert!(!ignores.ignores_file(Path::new("Makefile")));
}

#[test]
fn test_extend_ignores() {
    let ignores = Ignores::empty()
        .with_dirs(["drafts-old"])
        .with_extensions([".BAK"]);
    assert!(ignores.ignores_dir("drafts-old"));
    assert!(!ignores.ignores_dir(".git"));
    assert!(ignores.ignores_file(Path::new("notes.bak")));
}
