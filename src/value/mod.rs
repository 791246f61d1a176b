//! Typed values and the string converters that produce them.
//!
//! Every configuration value is a [`Value`]: a closed set of scalar and
//! collection payloads plus [`Object`] for bound pojo instances and custom
//! types. A [`ValueType`] converts between the textual form found in a source
//! and a `Value`; the [`ValueTypeRegistry`] maps type names and aliases to
//! converters.

mod registry;
mod types;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

pub use registry::{STRING_TYPE, ValueTypeRegistry};
pub use types::{
    BooleanType, DictionaryType, DoubleType, FloatType, IntegerType, ListType, LongType, SetType,
    StringType, ValueType,
};

/// A resolved configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i32),
    Long(i64),
    Boolean(bool),
    Float(f32),
    Double(f64),
    List(Vec<String>),
    Set(HashSet<String>),
    Dictionary(HashMap<String, String>),
    /// Unordered, duplicate-free values collected from a property set.
    Aggregate(Vec<Value>),
    Object(Object),
}

impl Value {
    /// Short name of the payload kind, used in error messages.
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Long(_) => "long",
            Value::Boolean(_) => "boolean",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Dictionary(_) => "dictionary",
            Value::Aggregate(_) => "aggregate",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric payloads widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Long(l) => Some(*l as f64),
            Value::Float(f) => Some(*f as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Integral payloads widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i as i64),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Flatten a collection payload into strings. `None` for scalars.
    pub fn into_strings(self) -> Option<Vec<String>> {
        match self {
            Value::List(items) => Some(items),
            Value::Set(items) => Some(items.into_iter().collect()),
            Value::Aggregate(items) => Some(items.iter().map(ToString::to_string).collect()),
            _ => None,
        }
    }

    /// Collect values into an aggregate, dropping duplicates.
    pub fn aggregate(values: impl IntoIterator<Item = Value>) -> Value {
        let mut unique: Vec<Value> = Vec::new();
        for value in values {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        Value::Aggregate(unique)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::List(items) => write!(f, "{}", items.join(",")),
            Value::Set(items) => {
                let mut sorted: Vec<&String> = items.iter().collect();
                sorted.sort();
                let joined: Vec<&str> = sorted.into_iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(","))
            }
            Value::Dictionary(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{key}:{}", map[key])?;
                }
                Ok(())
            }
            Value::Aggregate(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Object(object) => write!(f, "{}", object.type_name()),
        }
    }
}

/// A type-erased, shareable instance (a bound pojo or a custom value).
#[derive(Clone)]
pub struct Object {
    type_name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Object {
    pub fn new<T: Any + Send + Sync>(type_name: &str, value: T) -> Self {
        Self {
            type_name: Arc::from(type_name),
            inner: Arc::new(value),
        }
    }

    pub(crate) fn from_boxed(type_name: &str, value: Box<dyn Any + Send + Sync>) -> Self {
        Self {
            type_name: Arc::from(type_name),
            inner: Arc::from(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Strict conversion out of a [`Value`]. No coercion between payload kinds.
pub trait FromValue: Sized {
    /// Payload kind expected by this conversion, used in error messages.
    const EXPECTED: &'static str;

    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! from_value {
    ($ty:ty, $label:literal, $variant:ident) => {
        impl FromValue for $ty {
            const EXPECTED: &'static str = $label;

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

from_value!(String, "string", String);
from_value!(i32, "integer", Integer);
from_value!(i64, "long", Long);
from_value!(bool, "boolean", Boolean);
from_value!(f32, "float", Float);
from_value!(f64, "double", Double);
from_value!(Vec<String>, "list", List);
from_value!(HashSet<String>, "set", Set);
from_value!(HashMap<String, String>, "dictionary", Dictionary);

impl FromValue for Value {
    const EXPECTED: &'static str = "value";

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

/// A value together with the type that parses and renders it.
#[derive(Debug, Clone)]
pub struct TypedValue {
    value: Value,
    value_type: Arc<dyn ValueType>,
}

impl TypedValue {
    pub fn new(value: Value, value_type: Arc<dyn ValueType>) -> Self {
        Self { value, value_type }
    }

    /// Parse `raw` with `value_type`.
    pub fn parse(raw: &str, value_type: Arc<dyn ValueType>) -> Result<Self> {
        let value = value_type.value_of(raw)?;
        Ok(Self { value, value_type })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set(&mut self, value: Value) {
        self.value = value;
    }

    pub fn value_type(&self) -> &Arc<dyn ValueType> {
        &self.value_type
    }

    /// Render the payload through its type.
    pub fn string_value(&self) -> Result<String> {
        self.value_type.string_of(&self.value)
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.value_type.name() == other.value_type.name()
    }
}
