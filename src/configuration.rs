//! The configuration root and the typed accessor surface.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::context::ContextMap;
use crate::element::{Element, ElementContainer, Elements, Metadata};
use crate::error::{ProptreeError, Result};
use crate::path::Path;
use crate::resolve;
use crate::types::{PojoPolicy, ReloadPolicy, Version};
use crate::value::{FromValue, Object, Value};

/// A named, versioned element tree with ordered fallback includes.
///
/// Built once by [`ConfigurationBuilder`](crate::ConfigurationBuilder) and
/// never patched afterwards: reloading replaces the whole configuration.
#[derive(Debug)]
pub struct Configuration {
    pub(crate) name: String,
    pub(crate) version: Version,
    pub(crate) metadata: Metadata,
    pub(crate) reload_policy: Option<ReloadPolicy>,
    pub(crate) includes: Vec<Arc<Configuration>>,
    pub(crate) elements: Elements,
    pub(crate) pojo_policy: PojoPolicy,
    pub(crate) location: Option<String>,
}

impl Configuration {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// `None` means the configuration is static.
    pub fn reload_policy(&self) -> Option<&ReloadPolicy> {
        self.reload_policy.as_ref()
    }

    /// Included configurations in declaration order.
    pub fn includes(&self) -> &[Arc<Configuration>] {
        &self.includes
    }

    /// Policy used when evaluation reaches a pojo element.
    pub fn pojo_policy(&self) -> PojoPolicy {
        self.pojo_policy
    }

    /// Resource location this configuration was loaded from, if any.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Find the element at `path`, here or in the first include defining it.
    pub fn locate(&self, path: &Path) -> Result<Option<&Element>> {
        if let Some(element) = resolve::locate(&self.elements, path)? {
            return Ok(Some(element));
        }
        for include in &self.includes {
            if let Some(element) = include.locate(path)? {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    fn resolve_with_policy(
        &self,
        ctx: &ContextMap,
        path: &Path,
        policy: PojoPolicy,
    ) -> Result<Option<Value>> {
        if let Some(value) = resolve::resolve(ctx, &self.elements, path, policy)? {
            return Ok(Some(value));
        }
        // Includes are consulted in order; the first non-null result wins.
        for include in &self.includes {
            if let Some(value) = include.resolve_with_policy(ctx, path, policy)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

impl ElementContainer for Configuration {
    fn elements(&self) -> &Elements {
        &self.elements
    }

    fn elements_mut(&mut self) -> &mut Elements {
        &mut self.elements
    }
}

macro_rules! typed_accessors {
    ($($(#[$doc:meta])* $name:ident, $with:ident, $or:ident => $ty:ty;)*) => {
        $(
            $(#[$doc])*
            fn $name(&self, path: impl Into<Path>) -> Result<Option<$ty>> {
                self.get::<$ty>(path)
            }

            fn $with(&self, ctx: &ContextMap, path: impl Into<Path>) -> Result<Option<$ty>> {
                self.get_with::<$ty>(ctx, path)
            }

            fn $or(&self, path: impl Into<Path>, default: $ty) -> Result<$ty> {
                self.get_or::<$ty>(path, default)
            }
        )*
    };
}

/// Typed read access to a configuration tree.
///
/// Every accessor comes in three forms: plain, `_with` a context, and `_or`
/// a default used when the path is absent. Absence is `Ok(None)`; a value of
/// the wrong type is a [`ProptreeError::TypeMismatch`]. Only
/// [`string`](Self::string) converts, rendering any value as text.
pub trait PropertySource {
    /// Resolve `path` to its evaluated value.
    fn resolve_value(&self, ctx: &ContextMap, path: &Path) -> Result<Option<Value>>;

    /// Instantiate the pojo element at `path`.
    fn pojo_object(&self, path: &Path, policy: PojoPolicy) -> Result<Option<Object>>;

    fn get<T: FromValue>(&self, path: impl Into<Path>) -> Result<Option<T>> {
        self.get_with(ContextMap::empty(), path)
    }

    fn get_with<T: FromValue>(&self, ctx: &ContextMap, path: impl Into<Path>) -> Result<Option<T>> {
        let path = path.into();
        let Some(value) = self.resolve_value(ctx, &path)? else {
            return Ok(None);
        };
        let found = value.type_label();
        T::from_value(value)
            .map(Some)
            .ok_or_else(|| ProptreeError::TypeMismatch {
                path: path.to_string(),
                expected: T::EXPECTED,
                found,
            })
    }

    fn get_or<T: FromValue>(&self, path: impl Into<Path>, default: T) -> Result<T> {
        Ok(self.get(path)?.unwrap_or(default))
    }

    typed_accessors! {
        /// An `integer` (32-bit) value.
        integer, integer_with, integer_or => i32;
        /// A `long` (64-bit) value.
        long, long_with, long_or => i64;
        boolean, boolean_with, boolean_or => bool;
        float, float_with, float_or => f32;
        double, double_with, double_or => f64;
        /// An ordered `list` value.
        strings_list, strings_list_with, strings_list_or => Vec<String>;
        strings_set, strings_set_with, strings_set_or => HashSet<String>;
        dictionary, dictionary_with, dictionary_or => HashMap<String, String>;
        /// The raw evaluated value, whatever its kind.
        value, value_with, value_or => Value;
    }

    /// Any value rendered in its natural string form.
    fn string(&self, path: impl Into<Path>) -> Result<Option<String>> {
        self.string_with(ContextMap::empty(), path)
    }

    fn string_with(&self, ctx: &ContextMap, path: impl Into<Path>) -> Result<Option<String>> {
        Ok(self
            .resolve_value(ctx, &path.into())?
            .map(|value| value.to_string()))
    }

    fn string_or(&self, path: impl Into<Path>, default: &str) -> Result<String> {
        Ok(self.string(path)?.unwrap_or_else(|| default.to_string()))
    }

    /// A bound pojo instance downcast to `T`.
    fn pojo<T: Any + Send + Sync>(
        &self,
        path: impl Into<Path>,
        policy: PojoPolicy,
    ) -> Result<Option<Arc<T>>> {
        let path = path.into();
        let Some(object) = self.pojo_object(&path, policy)? else {
            return Ok(None);
        };
        object
            .downcast::<T>()
            .map(Some)
            .ok_or_else(|| ProptreeError::TypeMismatch {
                path: path.to_string(),
                expected: std::any::type_name::<T>(),
                found: "object",
            })
    }
}

impl PropertySource for Configuration {
    fn resolve_value(&self, ctx: &ContextMap, path: &Path) -> Result<Option<Value>> {
        self.resolve_with_policy(ctx, path, self.pojo_policy)
    }

    fn pojo_object(&self, path: &Path, policy: PojoPolicy) -> Result<Option<Object>> {
        match self.locate(path)? {
            Some(Element::Pojo(pojo)) => pojo.instantiate(policy).map(Some),
            Some(other) => Err(ProptreeError::TypeMismatch {
                path: path.to_string(),
                expected: "pojo",
                found: other.kind(),
            }),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{APP, Student, parse, parse_with_includes};

    #[test]
    fn typed_accessors_read_matching_types() {
        let config = parse(APP);
        assert_eq!(config.integer("port").unwrap(), Some(8080));
        assert_eq!(config.long("big").unwrap(), Some(5_000_000_000));
        assert_eq!(config.long("timeout").unwrap(), Some(30));
        assert_eq!(config.double("ratio").unwrap(), Some(0.5));
        assert_eq!(config.boolean("debug").unwrap(), Some(false));
        assert_eq!(
            config.strings_list("hosts").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        let labels = config.dictionary("labels").unwrap().unwrap();
        assert_eq!(labels.get("x").map(String::as_str), Some("1"));
    }

    #[test]
    fn type_mismatch_is_an_access_error() {
        let config = parse(APP);
        let err = config.integer("title").unwrap_err();
        assert!(err.is_value_access());
        assert!(matches!(
            err,
            ProptreeError::TypeMismatch {
                expected: "integer",
                found: "string",
                ..
            }
        ));
        // No widening between integer widths either.
        assert!(config.long("port").is_err());
    }

    #[test]
    fn string_renders_any_value() {
        let config = parse(APP);
        assert_eq!(config.string("port").unwrap().as_deref(), Some("8080"));
        assert_eq!(config.string("hosts").unwrap().as_deref(), Some("a,b"));
        assert_eq!(config.string("title").unwrap().as_deref(), Some("Demo"));
    }

    #[test]
    fn defaults_apply_only_to_absent_paths() {
        let config = parse(APP);
        assert_eq!(config.integer_or("missing", 7).unwrap(), 7);
        assert_eq!(config.integer_or("port", 7).unwrap(), 8080);
        assert_eq!(config.string_or("missing", "x").unwrap(), "x");
        assert!(config.integer_or("title", 7).is_err());
    }

    #[test]
    fn context_forms_feed_expressions_and_switches() {
        let config = parse(APP);
        let ctx = ContextMap::new().with("x", 2);
        assert_eq!(config.long_with(&ctx, "doubled").unwrap(), Some(4));
        assert_eq!(
            config.string_with(&ctx, "mode").unwrap().as_deref(),
            Some("b")
        );
        assert_eq!(config.string("mode").unwrap().as_deref(), Some("c"));
    }

    #[test]
    fn nested_paths() {
        let config = parse(APP);
        assert_eq!(config.integer("server:port").unwrap(), Some(80));
        assert_eq!(
            config.string(["x1", "x1", "xxx"]).unwrap(),
            config.string("x1:x1:xxx").unwrap()
        );
    }

    #[test]
    fn includes_fall_back_in_declaration_order() {
        let base = parse_with_includes();
        // c1 is declared before c2, so it shadows c2's "p".
        assert_eq!(base.integer("p").unwrap(), Some(1));
        assert_eq!(base.string("only-c2").unwrap().as_deref(), Some("c2"));
        assert_eq!(base.string("local").unwrap().as_deref(), Some("base"));
        assert_eq!(base.string("nowhere").unwrap(), None);
    }

    #[test]
    fn pojo_access_with_both_policies() {
        let config = parse(APP);
        let fresh_a = config.pojo::<Student>("student", PojoPolicy::Fresh).unwrap().unwrap();
        let fresh_b = config.pojo::<Student>("student", PojoPolicy::Fresh).unwrap().unwrap();
        assert_eq!(fresh_a.first_name, "Ruslan");
        assert!(!Arc::ptr_eq(&fresh_a, &fresh_b));

        let one = config.pojo::<Student>("student", PojoPolicy::Singleton).unwrap().unwrap();
        let two = config.pojo::<Student>("student", PojoPolicy::Singleton).unwrap().unwrap();
        assert!(Arc::ptr_eq(&one, &two));
    }

    #[test]
    fn pojo_access_on_wrong_kind_or_type() {
        let config = parse(APP);
        assert!(config.pojo::<Student>("port", PojoPolicy::Fresh).is_err());
        assert!(config.pojo::<String>("student", PojoPolicy::Fresh).is_err());
        assert!(config.pojo::<Student>("missing", PojoPolicy::Fresh).unwrap().is_none());
    }

    #[test]
    fn generic_value_access_builds_objects() {
        let config = parse(APP);
        match config.value("student").unwrap() {
            Some(Value::Object(object)) => {
                assert_eq!(object.downcast_ref::<Student>().unwrap().age, Some(30));
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn metadata_and_version() {
        let config = parse(APP);
        assert_eq!(config.name(), "app");
        assert_eq!(config.version().to_string(), "1.2.3");
        assert_eq!(config.metadata().get("owner"), Some("platform"));
        assert_eq!(config.metadata().get("revision"), Some("7"));
        assert!(config.reload_policy().is_some_and(|p| p.on_change));
    }
}
