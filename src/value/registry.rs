use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::types::{
    BooleanType, DictionaryType, DoubleType, FloatType, IntegerType, ListType, LongType, SetType,
    StringType, ValueType,
};

/// Name of the fallback type used for unknown or missing type names.
pub const STRING_TYPE: &str = "string";

const MAX_ALIAS_HOPS: usize = 16;

#[derive(Debug, Clone)]
enum Entry {
    Type(Arc<dyn ValueType>),
    Alias(String),
}

/// Maps case-sensitive type names and aliases to converters.
///
/// Registration is additive: the first writer of a name wins and later
/// registrations under the same name fail without touching the existing entry.
#[derive(Debug, Default)]
pub struct ValueTypeRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl ValueTypeRegistry {
    /// An empty registry. Lookups still fall back to a plain string type.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in types and their aliases.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(STRING_TYPE, Arc::new(StringType));
        registry.register("integer", Arc::new(IntegerType));
        registry.register("long", Arc::new(LongType));
        registry.register("float", Arc::new(FloatType));
        registry.register("double", Arc::new(DoubleType));
        registry.register("boolean", Arc::new(BooleanType));
        registry.register("list", Arc::new(ListType));
        registry.register("set", Arc::new(SetType));
        registry.register("dict", Arc::new(DictionaryType));

        registry.add_alias("String", STRING_TYPE);
        registry.add_alias("int", "integer");
        registry.add_alias("Integer", "integer");
        registry.add_alias("dictionary", "dict");
        registry.add_alias("Dictionary", "dict");
        registry
    }

    /// Register `value_type` under `name`. Returns `false` if the name is taken.
    pub fn register(&self, name: &str, value_type: Arc<dyn ValueType>) -> bool {
        let mut entries = self.entries.write();
        if name.is_empty() || entries.contains_key(name) {
            return false;
        }
        entries.insert(name.to_string(), Entry::Type(value_type));
        true
    }

    /// Make `alias` resolve to whatever `target` resolves to.
    ///
    /// Fails if the alias name is taken or the target is unknown.
    pub fn add_alias(&self, alias: &str, target: &str) -> bool {
        let mut entries = self.entries.write();
        if alias.is_empty() || entries.contains_key(alias) || !entries.contains_key(target) {
            return false;
        }
        entries.insert(alias.to_string(), Entry::Alias(target.to_string()));
        true
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entries.write().remove(name).is_some()
    }

    /// Resolve `name` through any aliases. `None` if it is not registered.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ValueType>> {
        let entries = self.entries.read();
        let mut current = name;
        for _ in 0..MAX_ALIAS_HOPS {
            match entries.get(current)? {
                Entry::Type(value_type) => return Some(Arc::clone(value_type)),
                Entry::Alias(target) => current = target,
            }
        }
        None
    }

    /// Resolve `name`, defaulting to the string type when it is missing or unknown.
    pub fn lookup(&self, name: Option<&str>) -> Arc<dyn ValueType> {
        name.and_then(|n| self.get(n))
            .or_else(|| self.get(STRING_TYPE))
            .unwrap_or_else(|| Arc::new(StringType) as Arc<dyn ValueType>)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Registered names (types and aliases), sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn defaults_cover_builtins_and_aliases() {
        let registry = ValueTypeRegistry::with_defaults();
        for name in ["string", "integer", "long", "float", "double", "boolean", "list", "set", "dict"] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
        assert_eq!(registry.get("int").unwrap().name(), "integer");
        assert_eq!(registry.get("Dictionary").unwrap().name(), "dict");
    }

    #[test]
    fn names_are_case_sensitive() {
        let registry = ValueTypeRegistry::with_defaults();
        assert!(registry.get("INTEGER").is_none());
    }

    #[test]
    fn unknown_type_defaults_to_string() {
        let registry = ValueTypeRegistry::with_defaults();
        assert_eq!(registry.lookup(Some("uuid")).name(), "string");
        assert_eq!(registry.lookup(None).name(), "string");
    }

    #[test]
    fn first_registration_wins() {
        let registry = ValueTypeRegistry::with_defaults();
        assert!(!registry.register("integer", Arc::new(StringType)));
        assert_eq!(
            registry.get("integer").unwrap().value_of("5").unwrap(),
            Value::Integer(5)
        );
    }

    #[test]
    fn aliases_resolve_transitively() {
        let registry = ValueTypeRegistry::with_defaults();
        assert!(registry.add_alias("i32", "int"));
        assert_eq!(registry.get("i32").unwrap().name(), "integer");
    }

    #[test]
    fn alias_requires_known_target_and_free_name() {
        let registry = ValueTypeRegistry::with_defaults();
        assert!(!registry.add_alias("thing", "nope"));
        assert!(!registry.add_alias("int", "long"));
        assert_eq!(registry.get("int").unwrap().name(), "integer");
    }

    #[test]
    fn removing_target_breaks_alias() {
        let registry = ValueTypeRegistry::with_defaults();
        assert!(registry.remove("dict"));
        assert!(registry.get("dictionary").is_none());
        assert_eq!(registry.lookup(Some("dictionary")).name(), "string");
    }
}
