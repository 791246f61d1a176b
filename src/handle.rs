use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::configuration::{Configuration, PropertySource};
use crate::context::ContextMap;
use crate::error::Result;
use crate::path::Path;
use crate::types::PojoPolicy;
use crate::value::{Object, Value};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`ConfigHandle`], stable across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live reference to a managed configuration.
///
/// Clones share the same slot. Every read works on one complete snapshot;
/// [`set_configuration`](Self::set_configuration) swaps the whole snapshot
/// atomically, so a read either sees the old configuration or the new one.
#[derive(Clone)]
pub struct ConfigHandle {
    id: HandleId,
    current: Arc<ArcSwap<Configuration>>,
}

impl ConfigHandle {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            id: HandleId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            current: Arc::new(ArcSwap::from_pointee(configuration)),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The configuration as of now.
    pub fn current(&self) -> Arc<Configuration> {
        self.current.load_full()
    }

    /// Replace the backing configuration.
    pub fn set_configuration(&self, configuration: impl Into<Arc<Configuration>>) {
        self.current.store(configuration.into());
    }

    pub fn name(&self) -> String {
        self.current.load().name().to_string()
    }
}

impl PartialEq for ConfigHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConfigHandle {}

impl fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load();
        f.debug_struct("ConfigHandle")
            .field("id", &self.id)
            .field("name", &current.name())
            .field("version", &current.version().to_string())
            .finish()
    }
}

impl PropertySource for ConfigHandle {
    fn resolve_value(&self, ctx: &ContextMap, path: &Path) -> Result<Option<Value>> {
        self.current().resolve_value(ctx, path)
    }

    fn pojo_object(&self, path: &Path, policy: PojoPolicy) -> Result<Option<Object>> {
        self.current().pojo_object(path, policy)
    }
}
