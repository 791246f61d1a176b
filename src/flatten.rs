//! Enumerate every addressable path of a configuration.
//!
//! Local elements come first, in name order, with set and pojo children
//! following their parent. Included configurations are walked afterwards in
//! declaration order; a path already listed shadows the same path further
//! down, exactly as resolution would.

use std::collections::HashSet;

use crate::configuration::Configuration;
use crate::element::{Element, ElementContainer, Elements};
use crate::path::SEPARATOR;

/// One addressable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub path: String,
    /// Element kind label, e.g. `property` or `switch`.
    pub kind: &'static str,
    pub description: Option<String>,
    /// Name of the configuration that defines the path.
    pub source: String,
}

pub fn flatten(configuration: &Configuration) -> Vec<PathEntry> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    collect(configuration, &mut seen, &mut out);
    out
}

fn collect(configuration: &Configuration, seen: &mut HashSet<String>, out: &mut Vec<PathEntry>) {
    walk(configuration.elements(), "", configuration.name(), seen, out);
    for include in configuration.includes() {
        collect(include, seen, out);
    }
}

fn walk(
    elements: &Elements,
    prefix: &str,
    source: &str,
    seen: &mut HashSet<String>,
    out: &mut Vec<PathEntry>,
) {
    for element in elements.iter() {
        let path = if prefix.is_empty() {
            element.name().to_string()
        } else {
            format!("{prefix}{SEPARATOR}{}", element.name())
        };
        if seen.insert(path.clone()) {
            out.push(entry(element, &path, source));
        }
        if let Some(children) = element.as_container() {
            walk(children, &path, source, seen, out);
        }
    }
}

fn entry(element: &Element, path: &str, source: &str) -> PathEntry {
    PathEntry {
        path: path.to_string(),
        kind: element.kind(),
        description: element.description().map(str::to_string),
        source: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{APP, parse, parse_with_includes};

    fn paths(entries: &[PathEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn nested_paths_follow_their_parent() {
        let entries = flatten(&parse(APP));
        let paths = paths(&entries);
        let server = paths.iter().position(|p| *p == "server").unwrap();
        assert_eq!(paths[server + 1], "server:host");
        assert_eq!(paths[server + 2], "server:port");
        assert!(paths.contains(&"x1:x1:xxx"));
        assert!(paths.contains(&"student:firstName"));
    }

    #[test]
    fn kinds_and_descriptions_are_reported() {
        let entries = flatten(&parse(APP));
        let find = |path: &str| entries.iter().find(|e| e.path == path).unwrap();
        assert_eq!(find("mode").kind, "switch");
        assert_eq!(find("doubled").kind, "expression");
        assert_eq!(find("alias").kind, "reference");
        assert_eq!(find("student").kind, "pojo");
        assert_eq!(find("colors").kind, "set");
        assert_eq!(find("timeout").description.as_deref(), Some("request timeout"));
        assert_eq!(find("port").source, "app");
    }

    #[test]
    fn includes_follow_local_and_are_shadowed() {
        let entries = flatten(&parse_with_includes());
        assert_eq!(paths(&entries), ["local", "only-c1", "p", "only-c2"]);
        let p = entries.iter().find(|e| e.path == "p").unwrap();
        assert_eq!(p.source, "c1");
    }
}
