use std::sync::Arc;

use crate::configuration::Configuration;
use crate::element::{Element, Elements, Metadata, MetadataProperty, is_valid_name};
use crate::error::{ProptreeError, Result};
use crate::types::{PojoPolicy, ReloadPolicy, Version};

/// Assembles a [`Configuration`] from parsed input.
///
/// Parsers fill in the name, version, metadata, reload policy, include
/// locations and elements; the [`Loader`](crate::Loader) resolves the include
/// locations into configurations and calls [`build`](Self::build).
#[derive(Debug)]
pub struct ConfigurationBuilder {
    origin: String,
    name: Option<String>,
    version: Version,
    metadata: Metadata,
    reload_policy: Option<ReloadPolicy>,
    include_locations: Vec<String>,
    includes: Vec<Arc<Configuration>>,
    elements: Elements,
    pojo_policy: PojoPolicy,
    location: Option<String>,
}

impl ConfigurationBuilder {
    /// `origin` names the source in error messages.
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            name: None,
            version: Version::default(),
            metadata: Metadata::new(),
            reload_policy: None,
            include_locations: Vec::new(),
            includes: Vec::new(),
            elements: Elements::new(),
            pojo_policy: PojoPolicy::default(),
            location: None,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn reload_policy(mut self, policy: ReloadPolicy) -> Self {
        self.reload_policy = Some(policy);
        self
    }

    /// Declare an include by location. Resolved by the loader.
    pub fn include_location(mut self, location: &str) -> Self {
        self.include_locations.push(location.to_string());
        self
    }

    /// Append an already-built include. Order of calls is lookup order.
    pub fn include(mut self, configuration: Arc<Configuration>) -> Self {
        self.includes.push(configuration);
        self
    }

    pub fn pojo_policy(mut self, policy: PojoPolicy) -> Self {
        self.pojo_policy = policy;
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn include_locations(&self) -> &[String] {
        &self.include_locations
    }

    /// Add a metadata entry. Duplicate names are a structural error.
    pub fn add_metadata(&mut self, name: &str, value: &str) -> Result<()> {
        if self.metadata.add(MetadataProperty::new(name, value)) {
            Ok(())
        } else {
            Err(ProptreeError::DuplicateElement {
                name: name.to_string(),
                container: format!("metadata of {}", self.origin),
            })
        }
    }

    /// Add a top-level element.
    pub fn add_element(&mut self, element: impl Into<Element>) -> Result<()> {
        let element = element.into();
        if !is_valid_name(element.name()) {
            return Err(ProptreeError::parse(
                &self.origin,
                format!("invalid element name '{}'", element.name()),
            ));
        }
        let container = self.origin.clone();
        self.elements.insert(element, &container)
    }

    pub fn build(self) -> Result<Configuration> {
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ProptreeError::parse(&self.origin, "configuration name is required"))?;
        Ok(Configuration {
            name,
            version: self.version,
            metadata: self.metadata,
            reload_policy: self.reload_policy,
            includes: self.includes,
            elements: self.elements,
            pojo_policy: self.pojo_policy,
            location: self.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::configuration::PropertySource;
    use crate::element::{Property, Reference};
    use crate::value::{StringType, TypedValue, Value};

    fn text(name: &str, value: &str) -> Property {
        Property::new(name, TypedValue::new(Value::from(value), Arc::new(StringType)))
    }

    #[test]
    fn builds_named_configuration() {
        let mut builder = ConfigurationBuilder::new("test")
            .name("app")
            .version("2.0.1".parse().unwrap())
            .reload_policy(ReloadPolicy::new(true, Duration::from_secs(5)));
        builder.add_element(text("host", "localhost")).unwrap();
        builder.add_metadata("owner", "ops").unwrap();
        let config = builder.build().unwrap();
        assert_eq!(config.name(), "app");
        assert_eq!(config.version().to_string(), "2.0.1");
        assert_eq!(config.metadata().get("owner"), Some("ops"));
        assert_eq!(config.string("host").unwrap().as_deref(), Some("localhost"));
    }

    #[test]
    fn version_defaults_when_absent() {
        let config = ConfigurationBuilder::new("test").name("app").build().unwrap();
        assert_eq!(config.version(), &Version::default());
        assert!(config.reload_policy().is_none());
    }

    #[test]
    fn name_is_required() {
        let err = ConfigurationBuilder::new("test").build().unwrap_err();
        assert!(matches!(err, ProptreeError::Parse { .. }));
    }

    #[test]
    fn duplicate_elements_are_rejected() {
        let mut builder = ConfigurationBuilder::new("test").name("app");
        builder.add_element(text("host", "a")).unwrap();
        let err = builder.add_element(Reference::new("host", "b")).unwrap_err();
        assert!(matches!(err, ProptreeError::DuplicateElement { .. }));
        let config = builder.build().unwrap();
        assert_eq!(config.string("host").unwrap().as_deref(), Some("a"));
    }

    #[test]
    fn separator_in_name_is_rejected() {
        let mut builder = ConfigurationBuilder::new("test").name("app");
        let err = builder.add_element(text("a:b", "x")).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn duplicate_metadata_is_rejected() {
        let mut builder = ConfigurationBuilder::new("test");
        builder.add_metadata("owner", "a").unwrap();
        assert!(builder.add_metadata("owner", "b").is_err());
    }

    #[test]
    fn includes_keep_declaration_order() {
        let first = Arc::new(ConfigurationBuilder::new("a").name("a").build().unwrap());
        let second = Arc::new(ConfigurationBuilder::new("b").name("b").build().unwrap());
        let config = ConfigurationBuilder::new("root")
            .name("root")
            .include(first)
            .include(second)
            .build()
            .unwrap();
        let names: Vec<&str> = config.includes().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
