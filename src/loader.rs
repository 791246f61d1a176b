//! Reading, parsing and include resolution.
//!
//! Loading one location:
//!
//! 1. Create the resource through the [`ResourceRegistry`]
//! 2. Read it and parse it into a [`ConfigurationBuilder`]
//! 3. Load every include location the same way, depth-first, in order
//! 4. Build the configuration with its includes attached
//!
//! Include chains are bounded by `max_include_depth`; a location that appears
//! twice in one chain is a cycle. Both are configuration-load errors.

use std::sync::Arc;

use tracing::{debug, info};

use crate::builder::ConfigurationBuilder;
use crate::configuration::Configuration;
use crate::element::PojoRegistry;
use crate::error::{ProptreeError, Result};
use crate::expr::{BasicEngine, ExpressionEngine};
use crate::parser::{ConfigurationParser, ParseContext, TomlParser};
use crate::resource::{Resource, ResourceRegistry};
use crate::types::PojoPolicy;
use crate::value::ValueTypeRegistry;

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 8;

#[derive(Debug, Clone)]
pub struct Loader {
    types: Arc<ValueTypeRegistry>,
    pojos: Arc<PojoRegistry>,
    resources: Arc<ResourceRegistry>,
    engine: Arc<dyn ExpressionEngine>,
    parser: Arc<dyn ConfigurationParser>,
    strict: bool,
    max_include_depth: usize,
    pojo_policy: PojoPolicy,
}

impl Loader {
    /// A loader using [`TomlParser`] and [`BasicEngine`] in strict mode.
    pub fn new(
        types: Arc<ValueTypeRegistry>,
        pojos: Arc<PojoRegistry>,
        resources: Arc<ResourceRegistry>,
    ) -> Self {
        Self {
            types,
            pojos,
            resources,
            engine: Arc::new(BasicEngine),
            parser: Arc::new(TomlParser),
            strict: true,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            pojo_policy: PojoPolicy::default(),
        }
    }

    pub fn engine(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ConfigurationParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn pojo_policy(mut self, policy: PojoPolicy) -> Self {
        self.pojo_policy = policy;
        self
    }

    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    /// Create the resource for `location`.
    pub fn open(&self, location: &str) -> Result<Arc<dyn Resource>> {
        self.resources.create(location)
    }

    /// Load the configuration at `location`.
    pub fn load(&self, location: &str) -> Result<Configuration> {
        let resource = self.open(location)?;
        self.load_resource(resource.as_ref())
    }

    /// Read, parse and build `resource`, resolving its includes.
    pub fn load_resource(&self, resource: &dyn Resource) -> Result<Configuration> {
        let mut chain = Vec::new();
        let configuration = self.load_chain(resource, resource.name(), &mut chain)?;
        info!(
            configuration = %configuration.name(),
            version = %configuration.version(),
            location = resource.name(),
            "configuration loaded"
        );
        Ok(configuration)
    }

    /// Re-read `resource`. `Ok(None)` if it no longer exists.
    pub fn reload(&self, resource: &dyn Resource) -> Result<Option<Configuration>> {
        if !resource.reload() {
            return Ok(None);
        }
        self.load_resource(resource).map(Some)
    }

    fn load_chain(
        &self,
        resource: &dyn Resource,
        location: &str,
        chain: &mut Vec<String>,
    ) -> Result<Configuration> {
        if chain.iter().any(|seen| seen == location) {
            chain.push(location.to_string());
            return Err(ProptreeError::load(
                location,
                format!("include cycle: {}", chain.join(" -> ")),
            ));
        }
        if chain.len() > self.max_include_depth {
            return Err(ProptreeError::load(
                location,
                format!("includes nest deeper than {}", self.max_include_depth),
            ));
        }
        chain.push(location.to_string());

        let mut builder = self.parse(resource)?;
        for include in builder.include_locations().to_vec() {
            let included = self.open(&include)?;
            let configuration = self.load_chain(included.as_ref(), &include, chain)?;
            debug!(parent = location, include = %include, "include resolved");
            builder = builder.include(Arc::new(configuration));
        }

        chain.pop();
        builder.build()
    }

    fn parse(&self, resource: &dyn Resource) -> Result<ConfigurationBuilder> {
        let source = resource.read()?;
        let ctx = ParseContext {
            types: &self.types,
            pojos: &self.pojos,
            engine: self.engine.as_ref(),
            strict: self.strict,
        };
        let builder = self.parser.parse(&source, resource.name(), &ctx)?;
        Ok(builder
            .pojo_policy(self.pojo_policy)
            .location(resource.name()))
    }
}
