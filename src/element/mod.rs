//! The element tree: named nodes addressable by [`Path`](crate::Path).
//!
//! [`Element`] is a closed sum over every node kind, so evaluation in
//! [`resolve`](crate::resolve) is an exhaustive match. Containers
//! ([`PropertySet`], [`PojoElement`] and the configuration root) hold their
//! children in [`Elements`], keyed by name.

mod pojo;
mod property;
mod switch;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ProptreeError, Result};
use crate::expr::Expression;
use crate::path::SEPARATOR;

pub use pojo::{Collect, PojoBinding, PojoBindingBuilder, PojoElement, PojoRegistry};
pub use property::{Metadata, MetadataProperty, Property, Reference};
pub use switch::{Condition, Guard, SwitchElement};

/// Element names must be non-empty and free of the path separator.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(SEPARATOR)
}

/// A named node in the configuration tree.
#[derive(Debug)]
pub enum Element {
    Property(Property),
    Expression(ExpressionElement),
    Switch(SwitchElement),
    Set(PropertySet),
    Pojo(PojoElement),
    Reference(Reference),
    Metadata(MetadataProperty),
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Element::Property(e) => e.name(),
            Element::Expression(e) => e.name(),
            Element::Switch(e) => e.name(),
            Element::Set(e) => e.name(),
            Element::Pojo(e) => e.name(),
            Element::Reference(e) => e.name(),
            Element::Metadata(e) => e.name(),
        }
    }

    /// Short label of the element kind, used in listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Property(_) => "property",
            Element::Expression(_) => "expression",
            Element::Switch(_) => "switch",
            Element::Set(_) => "set",
            Element::Pojo(_) => "pojo",
            Element::Reference(_) => "reference",
            Element::Metadata(_) => "metadata",
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Element::Property(e) => e.description(),
            Element::Expression(e) => e.description(),
            Element::Switch(e) => e.description(),
            Element::Set(e) => e.description(),
            Element::Pojo(e) => e.description(),
            Element::Reference(_) | Element::Metadata(_) => None,
        }
    }

    /// Children, for the kinds a path can descend through.
    pub fn as_container(&self) -> Option<&Elements> {
        match self {
            Element::Set(set) => Some(set.elements()),
            Element::Pojo(pojo) => Some(pojo.elements()),
            _ => None,
        }
    }
}

macro_rules! element_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Element {
                fn from(e: $ty) -> Self {
                    Element::$variant(e)
                }
            }
        )*
    };
}

element_from!(
    Property => Property,
    ExpressionElement => Expression,
    SwitchElement => Switch,
    PropertySet => Set,
    PojoElement => Pojo,
    Reference => Reference,
    MetadataProperty => Metadata,
);

/// Uniquely named children of one container.
#[derive(Debug, Default)]
pub struct Elements {
    entries: BTreeMap<String, Element>,
}

impl Elements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `element`. Returns `false`, leaving the container untouched, if the
    /// name is taken.
    pub fn add(&mut self, element: impl Into<Element>) -> bool {
        let element = element.into();
        if self.entries.contains_key(element.name()) {
            return false;
        }
        self.entries.insert(element.name().to_string(), element);
        true
    }

    /// Add `element`, failing with a duplicate-element error naming `container`.
    pub fn insert(&mut self, element: impl Into<Element>, container: &str) -> Result<()> {
        let element = element.into();
        let name = element.name().to_string();
        if self.add(element) {
            Ok(())
        } else {
            Err(ProptreeError::DuplicateElement {
                name,
                container: container.to_string(),
            })
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Element> {
        self.entries.remove(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Element> {
        self.entries.get(name)
    }

    /// All elements, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.entries.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Anything owning an [`Elements`] map.
pub trait ElementContainer {
    fn elements(&self) -> &Elements;

    fn elements_mut(&mut self) -> &mut Elements;

    fn add_element(&mut self, element: impl Into<Element>) -> bool
    where
        Self: Sized,
    {
        self.elements_mut().add(element)
    }

    fn remove_element(&mut self, name: &str) -> Option<Element> {
        self.elements_mut().remove(name)
    }

    fn has_element(&self, name: &str) -> bool {
        self.elements().has(name)
    }

    fn element(&self, name: &str) -> Option<&Element> {
        self.elements().get(name)
    }
}

/// A named group of elements with no value of its own. Evaluated directly it
/// aggregates its children.
#[derive(Debug)]
pub struct PropertySet {
    name: String,
    description: Option<String>,
    elements: Elements,
}

impl PropertySet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            elements: Elements::new(),
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
}

impl ElementContainer for PropertySet {
    fn elements(&self) -> &Elements {
        &self.elements
    }

    fn elements_mut(&mut self) -> &mut Elements {
        &mut self.elements
    }
}

/// A value computed from an expression each time it is read.
pub struct ExpressionElement {
    name: String,
    description: Option<String>,
    expression: Arc<dyn Expression>,
}

impl ExpressionElement {
    pub fn new(name: &str, expression: Arc<dyn Expression>) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            expression,
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

    pub fn expression(&self) -> &Arc<dyn Expression> {
        &self.expression
    }
}

impl fmt::Debug for ExpressionElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionElement")
            .field("name", &self.name)
            .field("expression", &self.expression.source())
            .finish()
    }
}
