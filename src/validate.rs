//! Strict-mode handling of unknown keys in TOML sources.
//!
//! Deserializes through `serde_ignored` so every key the target type does not
//! consume is captured. In strict mode each one is reported with its origin
//! and a best-effort line number; otherwise they are logged and skipped.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{ProptreeError, Result};

/// Deserialize `content` into `T`, rejecting unknown keys when `strict`.
pub fn deserialize_checked<T: DeserializeOwned>(
    content: &str,
    origin: &str,
    strict: bool,
) -> Result<T> {
    let mut unknown_keys: Vec<String> = Vec::new();

    let deserializer = toml::Deserializer::new(content);
    let document: T = serde_ignored::deserialize(deserializer, |ignored_path| {
        unknown_keys.push(ignored_path.to_string());
    })
    .map_err(|e| ProptreeError::parse(origin, e.to_string()))?;

    if unknown_keys.is_empty() {
        return Ok(document);
    }

    if !strict {
        for key in &unknown_keys {
            warn!(origin, key = %key, "ignoring unknown key");
        }
        return Ok(document);
    }

    let errors: Vec<ProptreeError> = unknown_keys
        .into_iter()
        .map(|key| {
            let line = find_key_line(content, &key);
            ProptreeError::UnknownKey {
                key,
                origin: origin.to_string(),
                line,
            }
        })
        .collect();

    Err(ProptreeError::UnknownKeys(errors))
}

/// Find the 1-indexed line of a dotted key such as `"reload.typo"`.
///
/// Tracks `[section]` headers and only matches the leaf inside the expected
/// section. Quoted leaf keys are matched too. Returns 0 if not found.
fn find_key_line(content: &str, dotted_key: &str) -> usize {
    let segments: Vec<&str> = dotted_key.split('.').collect();
    let Some((leaf, expected_section)) = segments.split_last() else {
        return 0;
    };
    let quoted = format!("\"{leaf}\"");

    let mut current_section: Vec<String> = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.starts_with('[') && !trimmed.starts_with("[[") {
            let header = trimmed.trim_start_matches('[').trim_end_matches(']').trim();
            current_section = header.split('.').map(|s| s.trim().to_string()).collect();
            continue;
        }

        let in_section = expected_section.len() == current_section.len()
            && expected_section
                .iter()
                .zip(&current_section)
                .all(|(a, b)| *a == b);
        if !in_section {
            continue;
        }

        let after_key = trimmed
            .strip_prefix(*leaf)
            .or_else(|| trimmed.strip_prefix(quoted.as_str()));
        if after_key.is_some_and(|rest| rest.trim_start().starts_with('=')) {
            return i + 1;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Doc {
        name: Option<String>,
        reload: Option<Reload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    #[allow(dead_code)]
    struct Reload {
        check_every: Option<String>,
    }

    fn unknown(content: &str) -> Vec<(String, usize)> {
        match deserialize_checked::<Doc>(content, "test.toml", true).unwrap_err() {
            ProptreeError::UnknownKeys(keys) => keys
                .into_iter()
                .map(|k| match k {
                    ProptreeError::UnknownKey { key, line, .. } => (key, line),
                    other => panic!("Expected UnknownKey, got: {other:?}"),
                })
                .collect(),
            other => panic!("Expected UnknownKeys, got: {other:?}"),
        }
    }

    #[test]
    fn known_keys_pass() {
        let content = "name = \"app\"\n[reload]\ncheck-every = \"5s\"\n";
        assert!(deserialize_checked::<Doc>(content, "test.toml", true).is_ok());
    }

    #[test]
    fn unknown_top_level_key_with_line() {
        assert_eq!(unknown("name = \"app\"\ntypo = 1\n"), [("typo".to_string(), 2)]);
    }

    #[test]
    fn unknown_nested_key_is_found_in_its_section() {
        let content = "typo = 0\n[reload]\ncheck-every = \"5s\"\ntypo = 1\n";
        let keys = unknown(content);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&("typo".to_string(), 1)));
        assert!(keys.contains(&("reload.typo".to_string(), 4)));
    }

    #[test]
    fn quoted_keys_are_located() {
        assert_eq!(unknown("\"odd\" = 1\n"), [("odd".to_string(), 1)]);
    }

    #[test]
    fn lenient_mode_skips_unknown_keys() {
        let doc: Doc = deserialize_checked("name = \"a\"\ntypo = 1\n", "test.toml", false).unwrap();
        assert_eq!(doc.name.as_deref(), Some("a"));
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let err = deserialize_checked::<Doc>("name = ", "test.toml", true).unwrap_err();
        assert!(matches!(err, ProptreeError::Parse { .. }));
        assert!(err.to_string().contains("test.toml"));
    }
}
