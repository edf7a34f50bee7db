use std::collections::BTreeSet;

/// Whether a tracked file takes part in word counting. Only the extension
/// decides; contents are never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Binary,
}

impl FileKind {
    pub fn of(path: &str, text_extensions: &BTreeSet<String>) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                if text_extensions.contains(&ext.to_ascii_lowercase()) {
                    FileKind::Text
                } else {
                    FileKind::Binary
                }
            }
            _ => FileKind::Binary,
        }
    }
}

pub fn count_words(bytes: &[u8]) -> usize {
    String::from_utf8_lossy(bytes).split_whitespace().count()
}

/// Coarse added/removed word estimate between two versions of a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordDelta {
    pub added: usize,
    pub removed: usize,
}

impl WordDelta {
    pub fn between(before: usize, after: usize) -> Self {
        WordDelta {
            added: after.saturating_sub(before),
            removed: before.saturating_sub(after),
        }
    }
}

#[cfg(test)]
fn text_extensions() -> BTreeSet<String> {
    ["md", "txt"].iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_file_kind() {
    let text = text_extensions();
    assert_eq!(FileKind::of("draft.md", &text), FileKind::Text);
    assert_eq!(FileKind::of("notes/IDEAS.TXT", &text), FileKind::Text);
    assert_eq!(FileKind::of("cover.png", &text), FileKind::Binary);
    assert_eq!(FileKind::of("md", &text), FileKind::Binary);
    assert_eq!(FileKind::of(".md", &text), FileKind::Binary);
    assert_eq!(FileKind::of("v1.2/README", &text), FileKind::Binary);
}

#[test]
fn test_count_words() {
    assert_eq!(count_words(b"Hello world"), 2);
    assert_eq!(count_words(b"  Hello\n\tbrave new   world \n"), 4);
    assert_eq!(count_words(b""), 0);
}

#[test]
fn test_word_delta() {
    assert_eq!(WordDelta::between(2, 4), WordDelta { added: 2, removed: 0 });
    assert_eq!(WordDelta::between(4, 1), WordDelta { added: 0, removed: 3 });
    assert_eq!(WordDelta::between(3, 3), WordDelta::default());
}
