//! Settings of the configuration service itself.
//!
//! These are not part of any managed configuration; they control how the
//! service loads and reloads. Resolved through confique: compiled defaults,
//! then an optional TOML file, then `PROPTREE_*` environment variables.

use std::path::Path;
use std::time::Duration;

use confique::Config;

use crate::error::Result;
use crate::loader::DEFAULT_MAX_INCLUDE_DEPTH;
use crate::types::PojoPolicy;

#[derive(Debug, Clone, Config)]
pub struct ServiceOptions {
    /// Schedule reload checks for configurations that declare a reload policy.
    #[config(default = true, env = "PROPTREE_RELOAD")]
    pub reload: bool,

    /// Pojo policy for generic value access: "fresh" or "singleton".
    #[config(default = "fresh", env = "PROPTREE_POJO_POLICY")]
    pub pojo_policy: PojoPolicy,

    /// Reject unknown top-level keys in configuration sources.
    #[config(default = true, env = "PROPTREE_STRICT")]
    pub strict: bool,

    /// How deep includes may nest.
    #[config(default = 8)]
    pub max_include_depth: usize,

    /// Lower bound for reload intervals, in seconds.
    #[config(default = 1, env = "PROPTREE_MIN_CHECK_EVERY")]
    pub min_check_every_secs: u64,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            reload: true,
            pojo_policy: PojoPolicy::Fresh,
            strict: true,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            min_check_every_secs: 1,
        }
    }
}

impl ServiceOptions {
    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self::builder().env().load()?)
    }

    /// Defaults, overridden by the TOML file at `path`, overridden by the
    /// environment. A missing file is skipped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::builder().env().file(path.as_ref()).load()?)
    }

    pub fn min_check_every(&self) -> Duration {
        Duration::from_secs(self.min_check_every_secs)
    }
}
