use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProptreeError, Result};

/// A `major.minor.patch` configuration version. Segments are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: String,
    pub minor: String,
    pub patch: String,
}

impl Default for Version {
    fn default() -> Self {
        Self {
            major: "0".into(),
            minor: "0".into(),
            patch: "0".into(),
        }
    }
}

impl FromStr for Version {
    type Err = ProptreeError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        match parts.as_slice() {
            [major, minor, patch] if parts.iter().all(|p| !p.is_empty()) => Ok(Self {
                major: major.to_string(),
                minor: minor.to_string(),
                patch: patch.to_string(),
            }),
            _ => Err(ProptreeError::format(
                "version",
                s,
                "expected three dot-separated segments",
            )),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Whether and how often a configuration's resource is polled for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadPolicy {
    pub on_change: bool,
    pub check_every: Duration,
}

impl ReloadPolicy {
    pub fn new(on_change: bool, check_every: Duration) -> Self {
        Self {
            on_change,
            check_every,
        }
    }

    /// Build a policy from a `<n><unit>` interval, unit one of `s`, `m`, `h`, `d`.
    pub fn on_change_every(check_every: &str) -> Result<Self> {
        Ok(Self::new(true, parse_check_every(check_every)?))
    }

    /// Only policies with `on_change` set are ever scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.on_change
    }
}

/// Parse a `<n><unit>` interval. Zero and unknown units are rejected.
pub fn parse_check_every(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = |reason: &str| ProptreeError::format("check-every", raw, reason);

    let Some(unit) = raw.chars().last() else {
        return Err(invalid("empty interval"));
    };
    let amount = &raw[..raw.len() - unit.len_utf8()];
    let amount: u64 = amount
        .parse()
        .map_err(|_| invalid("expected a whole number followed by s, m, h or d"))?;
    let factor = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(invalid("unit must be one of s, m, h, d")),
    };
    if amount == 0 {
        return Err(invalid("interval must be positive"));
    }
    amount
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid("interval is too large"))
}

/// How pojo elements produce instances on access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PojoPolicy {
    /// Build a new bound instance on every access.
    #[default]
    Fresh,
    /// Build once per element and hand out the cached instance afterwards.
    Singleton,
}

impl FromStr for PojoPolicy {
    type Err = ProptreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fresh" => Ok(Self::Fresh),
            "singleton" => Ok(Self::Singleton),
            other => Err(ProptreeError::format(
                "pojo policy",
                other,
                "expected 'fresh' or 'singleton'",
            )),
        }
    }
}

/// A query against loaded configurations, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Resolve `path`, with raw `name=value` context pairs.
    Get {
        configuration: Option<String>,
        path: String,
        context: Vec<(String, String)>,
    },
    /// Enumerate every addressable path.
    List { configuration: Option<String> },
}
