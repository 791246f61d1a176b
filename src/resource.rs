//! Configuration sources addressed by `prefix:path` locations.
//!
//! A [`Resource`] yields the text of one configuration source and answers
//! whether it changed since it was last read. Locations are turned into
//! resources by the [`ResourceRegistry`], which maps each prefix to a factory:
//!
//! - `file:<path>` → [`FileResource`], change detection by modification time.
//! - `string:<content>` → [`StringResource`], the content is the location itself.
//!
//! Further backends are plugged in with [`ResourceRegistry::register`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

use crate::error::{ProptreeError, Result};

const PREFIX_DELIMITER: char = ':';

/// One configuration source.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Location of the resource, used in logs and errors.
    fn name(&self) -> &str;

    /// Read the full content.
    fn read(&self) -> Result<String>;

    fn exists(&self) -> bool;

    /// True if the content may differ from what was last read.
    fn is_changed(&self) -> bool;

    /// Prepare for a fresh read. Returns `false` if the resource is gone.
    fn reload(&self) -> bool;
}

/// A file on disk.
#[derive(Debug)]
pub struct FileResource {
    name: String,
    path: PathBuf,
    last_read: Mutex<Option<SystemTime>>,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
            last_read: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
    }
}

impl Resource for FileResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<String> {
        let modified = self.modified();
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ProptreeError::load(&self.name, e.to_string()))?;
        *self.last_read.lock() = modified;
        Ok(content)
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Never-read files count as changed, and so do files that vanished.
    fn is_changed(&self) -> bool {
        match (*self.last_read.lock(), self.modified()) {
            (Some(last), Some(now)) => now != last,
            _ => true,
        }
    }

    fn reload(&self) -> bool {
        self.exists()
    }
}

#[derive(Debug)]
struct StringState {
    content: Option<String>,
    changed: bool,
}

/// In-memory content, replaceable at runtime.
#[derive(Debug)]
pub struct StringResource {
    name: String,
    state: Mutex<StringState>,
}

impl StringResource {
    pub fn new(content: &str) -> Self {
        Self::named("string", content)
    }

    /// A string resource with an explicit name for logs and errors.
    pub fn named(name: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(StringState {
                content: Some(content.to_string()),
                changed: false,
            }),
        }
    }

    pub fn content(&self) -> Option<String> {
        self.state.lock().content.clone()
    }

    /// Replace the content. Marks the resource changed only if it differs.
    pub fn set_content(&self, content: &str) {
        let mut state = self.state.lock();
        if state.content.as_deref() != Some(content) {
            state.changed = true;
        }
        state.content = Some(content.to_string());
    }

    /// Drop the content; the resource stops existing.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.changed = state.content.is_some();
        state.content = None;
    }
}

impl Resource for StringResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<String> {
        let mut state = self.state.lock();
        let content = state
            .content
            .clone()
            .ok_or_else(|| ProptreeError::load(&self.name, "resource has no content"))?;
        state.changed = false;
        Ok(content)
    }

    fn exists(&self) -> bool {
        self.state.lock().content.is_some()
    }

    fn is_changed(&self) -> bool {
        self.state.lock().changed
    }

    fn reload(&self) -> bool {
        self.exists()
    }
}

type Factory = Arc<dyn Fn(&str) -> Result<Arc<dyn Resource>> + Send + Sync>;

/// Maps location prefixes to resource factories.
pub struct ResourceRegistry {
    factories: RwLock<HashMap<String, Factory>>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ResourceRegistry {
    /// A registry with no prefixes.
    pub fn empty() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with the `file` and `string` prefixes.
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register("file", |path| {
            Ok(Arc::new(FileResource::new(path)) as Arc<dyn Resource>)
        });
        registry.register("string", |content| {
            Ok(Arc::new(StringResource::new(content)) as Arc<dyn Resource>)
        });
        registry
    }

    /// Install `factory` for `prefix`, replacing any previous one. Returns
    /// `true` if the prefix was new.
    pub fn register<F>(&self, prefix: &str, factory: F) -> bool
    where
        F: Fn(&str) -> Result<Arc<dyn Resource>> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(prefix.to_string(), Arc::new(factory))
            .is_none()
    }

    pub fn remove(&self, prefix: &str) -> bool {
        self.factories.write().remove(prefix).is_some()
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.factories.read().contains_key(prefix)
    }

    /// Registered prefixes, sorted.
    pub fn prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self.factories.read().keys().cloned().collect();
        prefixes.sort();
        prefixes
    }

    /// Create the resource for a `prefix:path` location.
    pub fn create(&self, location: &str) -> Result<Arc<dyn Resource>> {
        let Some((prefix, path)) = location.split_once(PREFIX_DELIMITER) else {
            return Err(ProptreeError::load(
                location,
                "location has no resource prefix",
            ));
        };
        // Clone the factory out so it runs without the lock held.
        let factory = self.factories.read().get(prefix).cloned();
        match factory {
            Some(factory) => factory(path),
            None => Err(ProptreeError::load(
                location,
                format!("no resource registered for prefix '{prefix}'"),
            )),
        }
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("prefixes", &self.prefixes())
            .finish()
    }
}
