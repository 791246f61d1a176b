use crate::element::{Element, Elements};
use crate::value::TypedValue;

/// A plain typed value.
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    description: Option<String>,
    value: TypedValue,
}

impl Property {
    pub fn new(name: &str, value: TypedValue) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            value,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn value(&self) -> &TypedValue {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut TypedValue {
        &mut self.value
    }
}

/// A stored link to another location. The target is kept verbatim and never
/// followed during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    name: String,
    value: String,
}

impl Reference {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A descriptive string entry of a configuration's [`Metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataProperty {
    name: String,
    value: String,
}

impl MetadataProperty {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Default)]
pub struct Metadata {
    entries: Elements,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if an entry with the same name exists.
    pub fn add(&mut self, property: MetadataProperty) -> bool {
        self.entries.add(property)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        match self.entries.get(name) {
            Some(Element::Metadata(entry)) => Some(entry.value()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataProperty> {
        self.entries.iter().filter_map(|element| match element {
            Element::Metadata(entry) => Some(entry),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
