//! Object elements bound through explicit per-type field tables.
//!
//! A [`PojoBinding`] is declared once per target type: a constructor plus one
//! setter per field name. A [`PojoElement`] evaluates each child element and
//! hands the result to the setter with the same name.

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::debug;

use crate::context::ContextMap;
use crate::element::{ElementContainer, Elements};
use crate::error::{ProptreeError, Result};
use crate::resolve::evaluate;
use crate::types::PojoPolicy;
use crate::value::{FromValue, Object, Value};

type Instance = Box<dyn Any + Send + Sync>;
type Constructor = Box<dyn Fn() -> Instance + Send + Sync>;
type Setter = Box<dyn Fn(&mut (dyn Any + Send + Sync + 'static), Value) -> Result<()> + Send + Sync>;

/// Collection fields that absorb evaluated values instead of being replaced.
pub trait Collect {
    /// Payload kind accepted, used in error messages.
    const EXPECTED: &'static str;

    /// Append the items of `value`. Returns `false` if the payload can't be
    /// absorbed; `self` is unchanged in that case.
    fn merge(&mut self, value: Value) -> bool;
}

impl Collect for Vec<String> {
    const EXPECTED: &'static str = "list";

    fn merge(&mut self, value: Value) -> bool {
        match value.into_strings() {
            Some(items) => {
                self.extend(items);
                true
            }
            None => false,
        }
    }
}

impl Collect for HashSet<String> {
    const EXPECTED: &'static str = "set";

    fn merge(&mut self, value: Value) -> bool {
        match value.into_strings() {
            Some(items) => {
                self.extend(items);
                true
            }
            None => false,
        }
    }
}

impl Collect for BTreeSet<String> {
    const EXPECTED: &'static str = "set";

    fn merge(&mut self, value: Value) -> bool {
        match value.into_strings() {
            Some(items) => {
                self.extend(items);
                true
            }
            None => false,
        }
    }
}

impl Collect for HashMap<String, String> {
    const EXPECTED: &'static str = "dictionary";

    fn merge(&mut self, value: Value) -> bool {
        match value {
            Value::Dictionary(map) => {
                self.extend(map);
                true
            }
            _ => false,
        }
    }
}

/// A missing collection is created on first merge.
impl<C: Collect + Default> Collect for Option<C> {
    const EXPECTED: &'static str = C::EXPECTED;

    fn merge(&mut self, value: Value) -> bool {
        if let Some(existing) = self {
            return existing.merge(value);
        }
        let mut created = C::default();
        if !created.merge(value) {
            return false;
        }
        *self = Some(created);
        true
    }
}

/// Constructor and field setters for one target type.
pub struct PojoBinding {
    type_name: String,
    construct: Constructor,
    setters: HashMap<String, Setter>,
}

impl PojoBinding {
    pub fn builder<T>(type_name: &str) -> PojoBindingBuilder<T>
    where
        T: Default + Send + Sync + 'static,
    {
        PojoBindingBuilder {
            type_name: type_name.to_string(),
            setters: HashMap::new(),
            _target: PhantomData,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    /// Bound field names, sorted.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.setters.keys().map(String::as_str).collect();
        fields.sort_unstable();
        fields
    }

    /// Build `elements` into a new instance.
    pub fn bind(&self, elements: &Elements, policy: PojoPolicy) -> Result<Object> {
        let mut instance = (self.construct)();
        for child in elements.iter() {
            let Some(value) = evaluate(child, ContextMap::empty(), policy)? else {
                continue;
            };
            match self.setters.get(child.name()) {
                Some(setter) => setter(instance.as_mut(), value)?,
                None => debug!(
                    pojo = %self.type_name,
                    field = child.name(),
                    "no setter bound, skipping field"
                ),
            }
        }
        Ok(Object::from_boxed(&self.type_name, instance))
    }
}

impl fmt::Debug for PojoBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PojoBinding")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields())
            .finish()
    }
}

/// Declares the field table of a [`PojoBinding`].
///
/// ```
/// use proptree::PojoBinding;
///
/// #[derive(Default)]
/// struct Server {
///     host: String,
///     port: i32,
///     tags: Vec<String>,
/// }
///
/// let binding = PojoBinding::builder::<Server>("Server")
///     .field("host", |s: &mut Server| &mut s.host)
///     .field("port", |s: &mut Server| &mut s.port)
///     .collection("tags", |s: &mut Server| &mut s.tags)
///     .build();
/// assert_eq!(binding.fields(), ["host", "port", "tags"]);
/// ```
pub struct PojoBindingBuilder<T> {
    type_name: String,
    setters: HashMap<String, Setter>,
    _target: PhantomData<fn() -> T>,
}

impl<T> PojoBindingBuilder<T>
where
    T: Default + Send + Sync + 'static,
{
    /// Assign the evaluated value, which must match `V` exactly.
    pub fn field<V, F>(self, name: &str, access: F) -> Self
    where
        V: FromValue + 'static,
        F: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        let path = format!("{}.{name}", self.type_name);
        self.with(name, move |target, value| {
            let found = value.type_label();
            *access(target) = V::from_value(value).ok_or_else(|| ProptreeError::TypeMismatch {
                path: path.clone(),
                expected: V::EXPECTED,
                found,
            })?;
            Ok(())
        })
    }

    /// Like [`field`](Self::field) for `Option<V>` fields.
    pub fn optional<V, F>(self, name: &str, access: F) -> Self
    where
        V: FromValue + 'static,
        F: Fn(&mut T) -> &mut Option<V> + Send + Sync + 'static,
    {
        let path = format!("{}.{name}", self.type_name);
        self.with(name, move |target, value| {
            let found = value.type_label();
            let value = V::from_value(value).ok_or_else(|| ProptreeError::TypeMismatch {
                path: path.clone(),
                expected: V::EXPECTED,
                found,
            })?;
            *access(target) = Some(value);
            Ok(())
        })
    }

    /// Merge the evaluated collection into the field instead of replacing it.
    pub fn collection<C, F>(self, name: &str, access: F) -> Self
    where
        C: Collect + 'static,
        F: Fn(&mut T) -> &mut C + Send + Sync + 'static,
    {
        let path = format!("{}.{name}", self.type_name);
        self.with(name, move |target, value| {
            let found = value.type_label();
            if access(target).merge(value) {
                Ok(())
            } else {
                Err(ProptreeError::TypeMismatch {
                    path: path.clone(),
                    expected: C::EXPECTED,
                    found,
                })
            }
        })
    }

    /// Bind `name` to a custom setter.
    pub fn with<F>(mut self, name: &str, setter: F) -> Self
    where
        F: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let type_name = self.type_name.clone();
        let erased: Setter = Box::new(move |target: &mut (dyn Any + Send + Sync + 'static), value: Value| {
            let target = target.downcast_mut::<T>().ok_or_else(|| {
                ProptreeError::Binding(format!("instance is not a {type_name}"))
            })?;
            setter(target, value)
        });
        self.setters.insert(name.to_string(), erased);
        self
    }

    pub fn build(self) -> PojoBinding {
        PojoBinding {
            type_name: self.type_name,
            construct: Box::new(|| Box::new(T::default()) as Instance),
            setters: self.setters,
        }
    }
}

/// Bindings by type name. First registration of a name wins.
#[derive(Debug, Default)]
pub struct PojoRegistry {
    bindings: RwLock<HashMap<String, Arc<PojoBinding>>>,
}

impl PojoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a binding for the same type name exists.
    pub fn register(&self, binding: PojoBinding) -> bool {
        let mut bindings = self.bindings.write();
        if bindings.contains_key(binding.type_name()) {
            return false;
        }
        bindings.insert(binding.type_name().to_string(), Arc::new(binding));
        true
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<PojoBinding>> {
        self.bindings.read().get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.bindings.read().contains_key(type_name)
    }

    pub fn remove(&self, type_name: &str) -> bool {
        self.bindings.write().remove(type_name).is_some()
    }
}

/// An object built from its child elements on access.
pub struct PojoElement {
    name: String,
    description: Option<String>,
    binding: Arc<PojoBinding>,
    elements: Elements,
    singleton: OnceCell<Object>,
}

impl PojoElement {
    pub fn new(name: &str, binding: Arc<PojoBinding>) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            binding,
            elements: Elements::new(),
            singleton: OnceCell::new(),
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

    pub fn type_name(&self) -> &str {
        self.binding.type_name()
    }

    /// A bound instance: built now under [`PojoPolicy::Fresh`], or built once
    /// and cached under [`PojoPolicy::Singleton`].
    pub fn instantiate(&self, policy: PojoPolicy) -> Result<Object> {
        match policy {
            PojoPolicy::Fresh => self.binding.bind(&self.elements, policy),
            PojoPolicy::Singleton => self
                .singleton
                .get_or_try_init(|| self.binding.bind(&self.elements, policy))
                .cloned(),
        }
    }
}

impl ElementContainer for PojoElement {
    fn elements(&self) -> &Elements {
        &self.elements
    }

    fn elements_mut(&mut self) -> &mut Elements {
        &mut self.elements
    }
}

impl fmt::Debug for PojoElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PojoElement")
            .field("name", &self.name)
            .field("type_name", &self.binding.type_name())
            .field("elements", &self.elements)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Property, PropertySet};
    use crate::fixtures::test::{Student, student_binding};
    use crate::value::{IntegerType, ListType, StringType, TypedValue};

    fn property(name: &str, value: Value) -> Property {
        let ty: Arc<dyn crate::value::ValueType> = match &value {
            Value::Integer(_) => Arc::new(IntegerType),
            Value::List(_) => Arc::new(ListType),
            _ => Arc::new(StringType),
        };
        Property::new(name, TypedValue::new(value, ty))
    }

    fn ruslan() -> PojoElement {
        let mut pojo = PojoElement::new("student", Arc::new(student_binding()));
        pojo.add_element(property("firstName", Value::from("Ruslan")));
        pojo.add_element(property("age", Value::Integer(30)));
        pojo.add_element(property(
            "courses",
            Value::List(vec!["math".into(), "art".into()]),
        ));
        pojo
    }

    #[test]
    fn fields_are_bound_by_name() {
        let object = ruslan().instantiate(PojoPolicy::Fresh).unwrap();
        let student = object.downcast_ref::<Student>().unwrap();
        assert_eq!(student.first_name, "Ruslan");
        assert_eq!(student.age, Some(30));
        assert_eq!(object.type_name(), "Student");
    }

    #[test]
    fn collections_merge_into_prepopulated_values() {
        let object = ruslan().instantiate(PojoPolicy::Fresh).unwrap();
        let student = object.downcast_ref::<Student>().unwrap();
        // Student::default() starts enrolled in "orientation".
        assert_eq!(student.courses, ["orientation", "math", "art"]);
    }

    #[test]
    fn missing_collection_is_created() {
        let mut pojo = ruslan();
        pojo.add_element(property("nicknames", Value::List(vec!["rus".into()])));
        let object = pojo.instantiate(PojoPolicy::Fresh).unwrap();
        let student = object.downcast_ref::<Student>().unwrap();
        assert_eq!(
            student.nicknames,
            Some(BTreeSet::from(["rus".to_string()]))
        );
    }

    #[test]
    fn unbound_fields_are_skipped() {
        let mut pojo = ruslan();
        pojo.add_element(property("shoeSize", Value::Integer(44)));
        assert!(pojo.instantiate(PojoPolicy::Fresh).is_ok());
    }

    #[test]
    fn mismatched_field_type_is_an_error() {
        let mut pojo = PojoElement::new("student", Arc::new(student_binding()));
        pojo.add_element(property("firstName", Value::Integer(1)));
        let err = pojo.instantiate(PojoPolicy::Fresh).unwrap_err();
        assert!(matches!(err, ProptreeError::TypeMismatch { .. }));
        assert!(err.to_string().contains("Student.firstName"));
    }

    #[test]
    fn fresh_builds_new_instances_singleton_reuses() {
        let pojo = ruslan();
        let a = pojo.instantiate(PojoPolicy::Fresh).unwrap();
        let b = pojo.instantiate(PojoPolicy::Fresh).unwrap();
        assert_ne!(a, b);
        let c = pojo.instantiate(PojoPolicy::Singleton).unwrap();
        let d = pojo.instantiate(PojoPolicy::Singleton).unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn set_children_aggregate_into_collections() {
        let mut pojo = PojoElement::new("student", Arc::new(student_binding()));
        let mut courses = PropertySet::new("courses");
        courses.add_element(property("first", Value::from("chemistry")));
        pojo.add_element(courses);
        let object = pojo.instantiate(PojoPolicy::Fresh).unwrap();
        let student = object.downcast_ref::<Student>().unwrap();
        assert!(student.courses.contains(&"chemistry".to_string()));
    }

    #[test]
    fn registry_first_wins() {
        let registry = PojoRegistry::new();
        assert!(registry.register(student_binding()));
        assert!(!registry.register(PojoBinding::builder::<Student>("Student").build()));
        assert!(registry.get("Student").unwrap().has_field("firstName"));
        assert!(registry.remove("Student"));
        assert!(!registry.contains("Student"));
    }
}
