//! Turning source text into a [`ConfigurationBuilder`].
//!
//! The default [`TomlParser`] reads documents of this shape:
//!
//! ```toml
//! name = "app"                      # required
//! version = "1.0.0"                 # default 0.0.0
//! include = ["file:shared.toml"]    # fallback configurations, in lookup order
//!
//! [reload]                          # absent: the configuration is static
//! on-change = true                  # default true
//! check-every = "30s"               # <n><unit>, unit one of s, m, h, d
//!
//! [metadata]
//! owner = "platform"
//!
//! [elements]
//! port = 8080                                      # property, type inferred
//! timeout = { value = "30", type = "long" }        # property, explicit type
//! doubled = { expression = "x * 2" }
//! mode = { switch = [{ when = "x == 1", value = "a" }, { else = "b" }] }
//! link = { reference = "server:host" }
//! student = { pojo = "Student", fields = { firstName = "Ruslan" } }
//! colors = { set = { primary = "red" } }
//!
//! [elements.server]                                # any other table is a set
//! host = "localhost"
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use toml::{Table, Value as Toml};

use crate::builder::ConfigurationBuilder;
use crate::element::{
    Condition, Element, ElementContainer, ExpressionElement, PojoElement, PojoRegistry, Property,
    PropertySet, Reference, SwitchElement, is_valid_name,
};
use crate::error::{ProptreeError, Result};
use crate::expr::ExpressionEngine;
use crate::types::{ReloadPolicy, Version, parse_check_every};
use crate::validate::deserialize_checked;
use crate::value::{TypedValue, Value, ValueType, ValueTypeRegistry};

/// Registries and switches a parser needs.
#[derive(Clone, Copy)]
pub struct ParseContext<'a> {
    pub types: &'a ValueTypeRegistry,
    pub pojos: &'a PojoRegistry,
    pub engine: &'a dyn ExpressionEngine,
    /// Reject unknown top-level keys instead of skipping them.
    pub strict: bool,
}

/// Parses one source into a builder. Includes stay unresolved locations.
pub trait ConfigurationParser: Send + Sync + fmt::Debug {
    fn parse(&self, source: &str, origin: &str, ctx: &ParseContext<'_>)
    -> Result<ConfigurationBuilder>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Document {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    include: Vec<String>,
    reload: Option<ReloadSection>,
    #[serde(default)]
    metadata: Table,
    #[serde(default)]
    elements: Table,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReloadSection {
    #[serde(default = "default_on_change")]
    on_change: bool,
    check_every: Option<String>,
}

fn default_on_change() -> bool {
    true
}

/// The built-in TOML source format.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlParser;

impl ConfigurationParser for TomlParser {
    fn parse(
        &self,
        source: &str,
        origin: &str,
        ctx: &ParseContext<'_>,
    ) -> Result<ConfigurationBuilder> {
        let document: Document = deserialize_checked(source, origin, ctx.strict)?;
        let fail = |reason: String| ProptreeError::parse(origin, reason);

        let mut builder = ConfigurationBuilder::new(origin);
        if let Some(name) = &document.name {
            builder = builder.name(name);
        }
        if let Some(version) = &document.version {
            let version: Version = version.parse().map_err(|e| fail(format!("{e}")))?;
            builder = builder.version(version);
        }
        for location in &document.include {
            builder = builder.include_location(location);
        }
        if let Some(reload) = &document.reload {
            let raw = reload
                .check_every
                .as_deref()
                .ok_or_else(|| fail("[reload] needs check-every".into()))?;
            let every = parse_check_every(raw).map_err(|e| fail(format!("{e}")))?;
            builder = builder.reload_policy(ReloadPolicy::new(reload.on_change, every));
        }

        for (key, value) in &document.metadata {
            let text = scalar_text(value)
                .ok_or_else(|| fail(format!("metadata '{key}' must be a scalar value")))?;
            builder.add_metadata(key, &text)?;
        }

        let walker = Walker { origin, ctx };
        for (name, value) in &document.elements {
            builder.add_element(walker.element(name, name, value)?)?;
        }
        Ok(builder)
    }
}

/// Converts `[elements]` entries, tracking the full path for error messages.
struct Walker<'a> {
    origin: &'a str,
    ctx: &'a ParseContext<'a>,
}

impl Walker<'_> {
    fn fail(&self, path: &str, reason: impl fmt::Display) -> ProptreeError {
        ProptreeError::parse(self.origin, format!("element '{path}': {reason}"))
    }

    fn element(&self, path: &str, name: &str, value: &Toml) -> Result<Element> {
        if !is_valid_name(name) {
            return Err(self.fail(path, "names must be non-empty and must not contain ':'"));
        }
        match value {
            Toml::Table(table) => self.table_element(path, name, table),
            other => Ok(Property::new(name, self.infer(path, other)?).into()),
        }
    }

    fn table_element(&self, path: &str, name: &str, table: &Table) -> Result<Element> {
        let description = match table.get("description") {
            Some(Toml::String(text)) => Some(text.as_str()),
            Some(_) if is_special(table) => {
                return Err(self.fail(path, "description must be a string"));
            }
            _ => None,
        };

        if let Some(raw) = table.get("value") {
            self.allow_keys(path, table, &["value", "type", "description"])?;
            let typed = match table.get("type") {
                Some(Toml::String(type_name)) => self.typed(path, raw, type_name)?,
                Some(_) => return Err(self.fail(path, "type must be a string")),
                None => self.infer(path, raw)?,
            };
            let mut property = Property::new(name, typed);
            if let Some(description) = description {
                property = property.with_description(description);
            }
            return Ok(property.into());
        }

        if let Some(source) = table.get("expression") {
            self.allow_keys(path, table, &["expression", "description"])?;
            let Toml::String(source) = source else {
                return Err(self.fail(path, "expression must be a string"));
            };
            let expression = self
                .ctx
                .engine
                .compile(source)
                .map_err(|e| self.fail(path, e))?;
            let mut element = ExpressionElement::new(name, expression);
            if let Some(description) = description {
                element = element.with_description(description);
            }
            return Ok(element.into());
        }

        if let Some(branches) = table.get("switch") {
            self.allow_keys(path, table, &["switch", "type", "description"])?;
            let value_type = match table.get("type") {
                Some(Toml::String(type_name)) => Some(self.ctx.types.lookup(Some(type_name))),
                Some(_) => return Err(self.fail(path, "type must be a string")),
                None => None,
            };
            let mut switch = SwitchElement::new(name);
            if let Some(description) = description {
                switch = switch.with_description(description);
            }
            let Toml::Array(branches) = branches else {
                return Err(self.fail(path, "switch must be an array of branches"));
            };
            for branch in branches {
                switch.push(self.condition(path, branch, value_type.as_ref())?);
            }
            return Ok(switch.into());
        }

        if let Some(type_name) = table.get("pojo") {
            self.allow_keys(path, table, &["pojo", "fields", "description"])?;
            let Toml::String(type_name) = type_name else {
                return Err(self.fail(path, "pojo must name a registered type"));
            };
            let binding = self
                .ctx
                .pojos
                .get(type_name)
                .ok_or_else(|| self.fail(path, format!("unknown pojo type '{type_name}'")))?;
            let mut pojo = PojoElement::new(name, binding);
            if let Some(description) = description {
                pojo = pojo.with_description(description);
            }
            match table.get("fields") {
                Some(Toml::Table(fields)) => self.children(path, fields, &mut pojo)?,
                Some(_) => return Err(self.fail(path, "fields must be a table")),
                None => {}
            }
            return Ok(pojo.into());
        }

        if let Some(target) = table.get("reference") {
            self.allow_keys(path, table, &["reference"])?;
            let Toml::String(target) = target else {
                return Err(self.fail(path, "reference must be a string"));
            };
            return Ok(Reference::new(name, target).into());
        }

        if let Some(children) = table.get("set") {
            self.allow_keys(path, table, &["set", "description"])?;
            let Toml::Table(children) = children else {
                return Err(self.fail(path, "set must be a table"));
            };
            let mut set = PropertySet::new(name);
            if let Some(description) = description {
                set = set.with_description(description);
            }
            self.children(path, children, &mut set)?;
            return Ok(set.into());
        }

        // A plain table groups its entries.
        let mut set = PropertySet::new(name);
        self.children(path, table, &mut set)?;
        Ok(set.into())
    }

    fn children(&self, path: &str, table: &Table, container: &mut impl ElementContainer) -> Result<()> {
        for (name, value) in table {
            let child_path = format!("{path}:{name}");
            let child = self.element(&child_path, name, value)?;
            container
                .elements_mut()
                .insert(child, &format!("element '{path}'"))?;
        }
        Ok(())
    }

    fn condition(
        &self,
        path: &str,
        branch: &Toml,
        value_type: Option<&Arc<dyn ValueType>>,
    ) -> Result<Condition> {
        let Toml::Table(branch) = branch else {
            return Err(self.fail(path, "switch branches must be tables"));
        };
        let value_of = |raw: &Toml| match value_type {
            Some(value_type) => self.parse_typed(path, raw, Arc::clone(value_type)),
            None => self.infer(path, raw),
        };

        if let Some(fallback) = branch.get("else") {
            self.allow_keys(path, branch, &["else"])?;
            return Ok(Condition::otherwise(value_of(fallback)?));
        }
        self.allow_keys(path, branch, &["when", "value"])?;
        let (Some(Toml::String(guard)), Some(raw)) = (branch.get("when"), branch.get("value")) else {
            return Err(self.fail(path, "a switch branch needs 'when' and 'value', or 'else'"));
        };
        let guard = self
            .ctx
            .engine
            .compile(guard)
            .map_err(|e| self.fail(path, e))?;
        Ok(Condition::when(guard, value_of(raw)?))
    }

    fn allow_keys(&self, path: &str, table: &Table, allowed: &[&str]) -> Result<()> {
        match table.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(self.fail(path, format!("unknown key '{key}'"))),
            None => Ok(()),
        }
    }

    /// A value with an explicit registry type, parsed from its text form.
    fn typed(&self, path: &str, raw: &Toml, type_name: &str) -> Result<TypedValue> {
        self.parse_typed(path, raw, self.ctx.types.lookup(Some(type_name)))
    }

    fn parse_typed(&self, path: &str, raw: &Toml, value_type: Arc<dyn ValueType>) -> Result<TypedValue> {
        let text = scalar_text(raw)
            .ok_or_else(|| self.fail(path, "typed values must be scalars or arrays of scalars"))?;
        TypedValue::parse(&text, value_type).map_err(|e| self.fail(path, e))
    }

    /// A value typed from its TOML form.
    fn infer(&self, path: &str, raw: &Toml) -> Result<TypedValue> {
        let types = self.ctx.types;
        let (value, type_name) = match raw {
            Toml::String(s) => (Value::String(s.clone()), "string"),
            Toml::Integer(i) => match i32::try_from(*i) {
                Ok(small) => (Value::Integer(small), "integer"),
                Err(_) => (Value::Long(*i), "long"),
            },
            Toml::Float(f) => (Value::Double(*f), "double"),
            Toml::Boolean(b) => (Value::Boolean(*b), "boolean"),
            Toml::Datetime(dt) => (Value::String(dt.to_string()), "string"),
            Toml::Array(items) => {
                let items = items
                    .iter()
                    .map(item_text)
                    .collect::<Option<Vec<String>>>()
                    .ok_or_else(|| self.fail(path, "arrays may only hold scalars"))?;
                (Value::List(items), "list")
            }
            Toml::Table(_) => return Err(self.fail(path, "unexpected table")),
        };
        Ok(TypedValue::new(value, types.lookup(Some(type_name))))
    }
}

/// Keys that make a table an element definition rather than a plain set.
fn is_special(table: &Table) -> bool {
    ["value", "expression", "switch", "pojo", "reference", "set"]
        .iter()
        .any(|key| table.contains_key(*key))
}

/// Text form of a scalar, or of an array of scalars joined with commas.
fn scalar_text(value: &Toml) -> Option<String> {
    match value {
        Toml::String(s) => Some(s.clone()),
        Toml::Integer(i) => Some(i.to_string()),
        Toml::Float(f) => Some(f.to_string()),
        Toml::Boolean(b) => Some(b.to_string()),
        Toml::Datetime(dt) => Some(dt.to_string()),
        Toml::Array(items) => items
            .iter()
            .map(item_text)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(",")),
        Toml::Table(_) => None,
    }
}

/// Text of an array item. Nested arrays and tables have none.
fn item_text(item: &Toml) -> Option<String> {
    match item {
        Toml::Array(_) | Toml::Table(_) => None,
        scalar => scalar_text(scalar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::PropertySource;
    use crate::element::Element;
    use crate::expr::BasicEngine;
    use crate::fixtures::test::{APP, student_binding};

    fn parse(source: &str) -> Result<ConfigurationBuilder> {
        let types = ValueTypeRegistry::with_defaults();
        let pojos = PojoRegistry::new();
        pojos.register(student_binding());
        let ctx = ParseContext {
            types: &types,
            pojos: &pojos,
            engine: &BasicEngine,
            strict: true,
        };
        TomlParser.parse(source, "test.toml", &ctx)
    }

    fn parse_err(source: &str) -> String {
        parse(source).unwrap_err().to_string()
    }

    #[test]
    fn full_document_parses() {
        let builder = parse(APP).unwrap();
        assert!(builder.include_locations().is_empty());
        let config = builder.build().unwrap();
        assert_eq!(config.name(), "app");
        let policy = config.reload_policy().unwrap();
        assert!(policy.on_change);
        assert_eq!(policy.check_every.as_secs(), 5);
    }

    #[test]
    fn element_kinds_are_recognized() {
        let config = parse(APP).unwrap().build().unwrap();
        let kind = |path: &str| config.locate(&path.into()).unwrap().map(Element::kind);
        assert_eq!(kind("port"), Some("property"));
        assert_eq!(kind("doubled"), Some("expression"));
        assert_eq!(kind("mode"), Some("switch"));
        assert_eq!(kind("alias"), Some("reference"));
        assert_eq!(kind("student"), Some("pojo"));
        assert_eq!(kind("colors"), Some("set"));
        assert_eq!(kind("server"), Some("set"));
        assert_eq!(kind("server:host"), Some("property"));
    }

    #[test]
    fn inferred_types() {
        let config = parse(APP).unwrap().build().unwrap();
        assert_eq!(config.value("port").unwrap(), Some(Value::Integer(8080)));
        assert_eq!(config.value("big").unwrap(), Some(Value::Long(5_000_000_000)));
        assert_eq!(config.value("ratio").unwrap(), Some(Value::Double(0.5)));
        assert_eq!(config.value("debug").unwrap(), Some(Value::Boolean(false)));
    }

    #[test]
    fn typed_switch_values() {
        let source = r#"
name = "t"
[elements]
limit = { switch = [{ when = "tier == 'gold'", value = "100" }, { else = "10" }], type = "long" }
"#;
        let config = parse(source).unwrap().build().unwrap();
        assert_eq!(config.long("limit").unwrap(), Some(10));
    }

    #[test]
    fn explicit_type_parses_text() {
        let source = "name = \"t\"\n[elements]\nids = { value = \"a, b,c\", type = \"set\", description = \"ids\" }\n";
        let config = parse(source).unwrap().build().unwrap();
        assert_eq!(config.strings_set("ids").unwrap().map(|s| s.len()), Some(3));
        let element = config.locate(&"ids".into()).unwrap().unwrap();
        assert_eq!(element.description(), Some("ids"));
    }

    #[test]
    fn bad_typed_value_is_a_parse_error() {
        let msg = parse_err("name = \"t\"\n[elements]\nn = { value = \"x\", type = \"integer\" }\n");
        assert!(msg.contains("element 'n'"), "{msg}");
    }

    #[test]
    fn include_locations_are_kept_in_order() {
        let builder = parse("name = \"t\"\ninclude = [\"string:a\", \"file:b\"]\n").unwrap();
        assert_eq!(builder.include_locations(), ["string:a", "file:b"]);
    }

    #[test]
    fn reload_section_validation() {
        assert!(parse("name = \"t\"\n[reload]\ncheck-every = \"0s\"\n").is_err());
        assert!(parse("name = \"t\"\n[reload]\ncheck-every = \"soon\"\n").is_err());
        assert!(parse("name = \"t\"\n[reload]\non-change = true\n").is_err());
        let config = parse("name = \"t\"\n[reload]\non-change = false\ncheck-every = \"1m\"\n")
            .unwrap()
            .build()
            .unwrap();
        assert!(!config.reload_policy().unwrap().is_scheduled());
    }

    #[test]
    fn unknown_top_level_keys_are_rejected_in_strict_mode() {
        let err = parse("name = \"t\"\nnmae = \"typo\"\n").unwrap_err();
        assert!(matches!(err, ProptreeError::UnknownKeys(_)));
    }

    #[test]
    fn unknown_element_keys_are_rejected() {
        let msg = parse_err("name = \"t\"\n[elements]\np = { value = 1, colour = \"red\" }\n");
        assert!(msg.contains("colour"), "{msg}");
    }

    #[test]
    fn unknown_pojo_type_is_rejected() {
        let msg = parse_err("name = \"t\"\n[elements]\np = { pojo = \"Teacher\" }\n");
        assert!(msg.contains("Teacher"), "{msg}");
    }

    #[test]
    fn bad_expressions_are_rejected() {
        assert!(parse("name = \"t\"\n[elements]\ne = { expression = \"1 +\" }\n").is_err());
        assert!(parse(
            "name = \"t\"\n[elements]\ns = { switch = [{ when = \"((\", value = 1 }] }\n"
        )
        .is_err());
    }

    #[test]
    fn names_with_separator_are_rejected() {
        let msg = parse_err("name = \"t\"\n[elements]\n\"a:b\" = 1\n");
        assert!(msg.contains("a:b"), "{msg}");
    }

    #[test]
    fn nested_arrays_are_rejected() {
        assert!(parse("name = \"t\"\n[elements]\nm = [[1, 2]]\n").is_err());
    }

    #[test]
    fn metadata_must_be_scalar() {
        assert!(parse("name = \"t\"\n[metadata]\nnested = { a = 1 }\n").is_err());
    }

    #[test]
    fn bad_version_is_rejected() {
        assert!(parse("name = \"t\"\nversion = \"1.0\"\n").is_err());
    }
}
