//! Query operations behind `get` and `list`, and the result type callers
//! display.

use std::fmt;

use crate::configuration::{Configuration, PropertySource};
use crate::context::ContextMap;
use crate::error::{ProptreeError, Result};
use crate::flatten;
use crate::path::Path;

/// Result of a query. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigResult {
    /// A path's evaluated value and the element's description.
    PathValue {
        path: String,
        value: String,
        doc: Option<String>,
    },
    /// Every addressable path of a configuration with its element kind.
    Listing {
        configuration: String,
        entries: Vec<(String, String)>,
    },
}

impl fmt::Display for ConfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigResult::PathValue { path, value, doc } => {
                if let Some(doc) = doc {
                    writeln!(f, "# {doc}")?;
                }
                write!(f, "{path} = {value}")
            }
            ConfigResult::Listing { entries, .. } => {
                for (i, (path, kind)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{path} ({kind})")?;
                }
                Ok(())
            }
        }
    }
}

/// Resolve `path` under `ctx`. Absence is a [`ProptreeError::PropertyNotFound`].
pub fn get_value(
    configuration: &Configuration,
    path: &str,
    ctx: &ContextMap,
) -> Result<ConfigResult> {
    let parsed = Path::from(path);
    let value = configuration
        .resolve_value(ctx, &parsed)?
        .ok_or_else(|| ProptreeError::PropertyNotFound {
            path: path.to_string(),
            configuration: configuration.name().to_string(),
        })?;
    let doc = configuration
        .locate(&parsed)?
        .and_then(|element| element.description())
        .map(str::to_string);

    Ok(ConfigResult::PathValue {
        path: path.to_string(),
        value: value.to_string(),
        doc,
    })
}

/// List every addressable path of `configuration`.
pub fn list_values(configuration: &Configuration) -> ConfigResult {
    let entries = flatten::flatten(configuration)
        .into_iter()
        .map(|entry| (entry.path, entry.kind.to_string()))
        .collect();
    ConfigResult::Listing {
        configuration: configuration.name().to_string(),
        entries,
    }
}
