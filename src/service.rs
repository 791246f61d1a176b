use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::context::ContextMap;
use crate::element::{PojoBinding, PojoRegistry};
use crate::error::{ProptreeError, Result};
use crate::expr::ExpressionEngine;
use crate::handle::ConfigHandle;
use crate::loader::Loader;
use crate::ops::{self, ConfigResult};
use crate::options::ServiceOptions;
use crate::parser::ConfigurationParser;
use crate::reload::{ReloadService, ReloadState};
use crate::resource::{Resource, ResourceRegistry};
use crate::types::{ConfigAction, Version};
use crate::value::{ValueType, ValueTypeRegistry};

/// Loads, holds and reloads named configurations.
///
/// Owns every registry it uses; nothing is process-global. Configurations are
/// kept by the name they had when loaded, several versions of one name side
/// by side in load order.
pub struct ConfigService {
    types: Arc<ValueTypeRegistry>,
    pojos: Arc<PojoRegistry>,
    resources: Arc<ResourceRegistry>,
    loader: Arc<Loader>,
    reload: Option<ReloadService>,
    holder: RwLock<BTreeMap<String, Vec<ConfigHandle>>>,
    options: ServiceOptions,
}

impl ConfigService {
    pub fn builder() -> ConfigServiceBuilder {
        ConfigServiceBuilder::new()
    }

    pub fn value_types(&self) -> &Arc<ValueTypeRegistry> {
        &self.types
    }

    pub fn pojos(&self) -> &Arc<PojoRegistry> {
        &self.pojos
    }

    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Load the configuration at a `prefix:path` location.
    pub fn load(&self, location: &str) -> Result<ConfigHandle> {
        let resource = self.loader.open(location)?;
        self.load_resource(resource)
    }

    /// Load each location in order. Stops at the first failure; whatever
    /// loaded before it stays loaded.
    pub fn load_all<I, S>(&self, locations: I) -> Result<Vec<ConfigHandle>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        locations
            .into_iter()
            .map(|location| self.load(location.as_ref()))
            .collect()
    }

    /// Load a configuration from an existing resource and start managing it.
    pub fn load_resource(&self, resource: Arc<dyn Resource>) -> Result<ConfigHandle> {
        let configuration = self.loader.load_resource(resource.as_ref())?;
        let name = configuration.name().to_string();
        let handle = ConfigHandle::new(configuration);
        if let Some(reload) = &self.reload {
            reload.watch(handle.clone(), resource)?;
        }
        self.holder
            .write()
            .entry(name)
            .or_default()
            .push(handle.clone());
        Ok(handle)
    }

    /// Stop managing `handle`. Returns `false` if it was not loaded here.
    pub fn unload(&self, handle: &ConfigHandle) -> bool {
        let removed = {
            let mut holder = self.holder.write();
            let mut removed = false;
            holder.retain(|_, handles| {
                let before = handles.len();
                handles.retain(|h| h != handle);
                removed |= handles.len() != before;
                !handles.is_empty()
            });
            removed
        };
        if !removed {
            return false;
        }
        if let Some(reload) = &self.reload
            && let Err(e) = reload.unwatch(handle.id())
        {
            warn!(handle = %handle.id(), error = %e, "could not cancel reload");
        }
        info!(handle = %handle.id(), configuration = %handle.name(), "configuration unloaded");
        true
    }

    /// The first loaded configuration called `name`.
    pub fn configuration(&self, name: &str) -> Option<ConfigHandle> {
        self.holder
            .read()
            .get(name)
            .and_then(|handles| handles.first().cloned())
    }

    /// The configuration called `name` whose current version is `version`.
    pub fn configuration_version(&self, name: &str, version: &Version) -> Option<ConfigHandle> {
        self.holder.read().get(name).and_then(|handles| {
            handles
                .iter()
                .find(|handle| handle.current().version() == version)
                .cloned()
        })
    }

    /// Every loaded configuration, by name then load order.
    pub fn configurations(&self) -> Vec<ConfigHandle> {
        self.holder.read().values().flatten().cloned().collect()
    }

    pub async fn suspend(&self, handle: &ConfigHandle) -> Result<bool> {
        match &self.reload {
            Some(reload) => reload.suspend(handle.id()).await,
            None => Ok(false),
        }
    }

    pub async fn resume(&self, handle: &ConfigHandle) -> Result<bool> {
        match &self.reload {
            Some(reload) => reload.resume(handle.id()).await,
            None => Ok(false),
        }
    }

    pub async fn suspend_all(&self) -> Result<usize> {
        match &self.reload {
            Some(reload) => reload.suspend_all().await,
            None => Ok(0),
        }
    }

    pub async fn resume_all(&self) -> Result<usize> {
        match &self.reload {
            Some(reload) => reload.resume_all().await,
            None => Ok(0),
        }
    }

    /// `None` if `handle` is not managed. With reloading disabled every
    /// managed configuration is static.
    pub async fn reload_state(&self, handle: &ConfigHandle) -> Result<Option<ReloadState>> {
        match &self.reload {
            Some(reload) => reload.state(handle.id()).await,
            None => Ok(self
                .configurations()
                .contains(handle)
                .then_some(ReloadState::Static)),
        }
    }

    /// Stop reloading and drop every configuration.
    pub async fn destroy(&self) -> Result<()> {
        let stopped = match &self.reload {
            Some(reload) if reload.is_running() => reload.shutdown().await,
            _ => Ok(()),
        };
        self.holder.write().clear();
        info!("configuration service destroyed");
        stopped
    }

    /// Execute a query. Without a configuration name the first configuration
    /// by name is used.
    pub fn handle(&self, action: &ConfigAction) -> Result<ConfigResult> {
        match action {
            ConfigAction::Get {
                configuration,
                path,
                context,
            } => {
                let handle = self.target(configuration.as_deref())?;
                let ctx = ContextMap::from_raw_pairs(context.iter().map(|(k, v)| (k, v)));
                ops::get_value(&handle.current(), path, &ctx)
            }
            ConfigAction::List { configuration } => {
                let handle = self.target(configuration.as_deref())?;
                Ok(ops::list_values(&handle.current()))
            }
        }
    }

    /// Execute a query and print the result to stdout.
    pub fn handle_and_print(&self, action: &ConfigAction) -> Result<()> {
        let result = self.handle(action)?;
        println!("{result}");
        Ok(())
    }

    fn target(&self, name: Option<&str>) -> Result<ConfigHandle> {
        match name {
            Some(name) => self
                .configuration(name)
                .ok_or_else(|| ProptreeError::UnknownConfiguration(name.to_string())),
            None => self
                .configurations()
                .into_iter()
                .next()
                .ok_or_else(|| ProptreeError::UnknownConfiguration("<any>".to_string())),
        }
    }
}

impl fmt::Debug for ConfigService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.holder.read().keys().cloned().collect();
        f.debug_struct("ConfigService")
            .field("configurations", &names)
            .field("reload", &self.reload)
            .field("options", &self.options)
            .finish()
    }
}

/// Builder for a [`ConfigService`].
///
/// Options come from [`options()`](Self::options) if given, otherwise from
/// the environment via [`ServiceOptions::from_env`]. Individual settings
/// ([`strict()`](Self::strict), [`no_reload()`](Self::no_reload)) win over
/// both.
pub struct ConfigServiceBuilder {
    options: Option<ServiceOptions>,
    strict: Option<bool>,
    reload: Option<bool>,
    types: Option<Arc<ValueTypeRegistry>>,
    value_types: Vec<(String, Arc<dyn ValueType>)>,
    bindings: Vec<PojoBinding>,
    resources: Option<Arc<ResourceRegistry>>,
    engine: Option<Arc<dyn ExpressionEngine>>,
    parser: Option<Arc<dyn ConfigurationParser>>,
}

impl ConfigServiceBuilder {
    fn new() -> Self {
        Self {
            options: None,
            strict: None,
            reload: None,
            types: None,
            value_types: Vec::new(),
            bindings: Vec::new(),
            resources: None,
            engine: None,
            parser: None,
        }
    }

    /// Use these options instead of reading the environment.
    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Enable or disable strict mode. In strict mode unknown top-level keys
    /// in configuration sources are errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Never schedule reload checks. The service then works without a Tokio
    /// runtime.
    pub fn no_reload(mut self) -> Self {
        self.reload = Some(false);
        self
    }

    /// Replace the value type registry (default: the built-in types).
    pub fn value_type_registry(mut self, types: Arc<ValueTypeRegistry>) -> Self {
        self.types = Some(types);
        self
    }

    /// Register an extra value type under `name`.
    pub fn value_type(mut self, name: &str, value_type: Arc<dyn ValueType>) -> Self {
        self.value_types.push((name.to_string(), value_type));
        self
    }

    /// Make a pojo type available to `pojo = "<type>"` elements.
    pub fn pojo(mut self, binding: PojoBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Replace the resource registry (default: `file` and `string`).
    pub fn resource_registry(mut self, resources: Arc<ResourceRegistry>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn expression_engine(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ConfigurationParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn build(self) -> Result<ConfigService> {
        let mut options = match self.options {
            Some(options) => options,
            None => ServiceOptions::from_env()?,
        };
        if let Some(strict) = self.strict {
            options.strict = strict;
        }
        if let Some(reload) = self.reload {
            options.reload = reload;
        }
        let pojo_policy = options.pojo_policy;

        let types = self
            .types
            .unwrap_or_else(|| Arc::new(ValueTypeRegistry::with_defaults()));
        for (name, value_type) in self.value_types {
            types.register(&name, value_type);
        }
        let pojos = Arc::new(PojoRegistry::new());
        for binding in self.bindings {
            pojos.register(binding);
        }
        let resources = self
            .resources
            .unwrap_or_else(|| Arc::new(ResourceRegistry::with_defaults()));

        let mut loader = Loader::new(Arc::clone(&types), Arc::clone(&pojos), Arc::clone(&resources))
            .strict(options.strict)
            .max_include_depth(options.max_include_depth)
            .pojo_policy(pojo_policy);
        if let Some(engine) = self.engine {
            loader = loader.engine(engine);
        }
        if let Some(parser) = self.parser {
            loader = loader.parser(parser);
        }
        let loader = Arc::new(loader);

        let reload = if options.reload {
            Some(ReloadService::start(
                Arc::clone(&loader),
                options.min_check_every(),
            )?)
        } else {
            None
        };

        Ok(ConfigService {
            types,
            pojos,
            resources,
            loader,
            reload,
            holder: RwLock::new(BTreeMap::new()),
            options,
        })
    }
}
