use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ignores::Ignores;

const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "mdx", "txt", "text", "rst", "org", "adoc", "tex", "fountain", "html", "htm",
];

/// Per-workspace settings, stored as `config.json` in the history root.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub ignores: Ignores,
    /// Extensions whose files count towards word deltas.
    pub text_extensions: BTreeSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ignores: Ignores::default(),
            text_extensions: DEFAULT_TEXT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[test]
fn test_partial_config_keeps_defaults() {
    let config: Config = serde_json::from_str(r#"{"textExtensions": ["md"]}"#).unwrap();
    assert_eq!(config.ignores, Ignores::default());
    assert_eq!(config.text_extensions.len(), 1);
}
