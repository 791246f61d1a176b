use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProptreeError, Result};
use crate::value::Value;

const ITEM_SEPARATOR: char = ',';
const KEY_VALUE_SEPARATOR: char = ':';

/// Bidirectional converter between a textual form and a [`Value`].
pub trait ValueType: Send + Sync + fmt::Debug {
    /// Canonical registry name of this type.
    fn name(&self) -> &str;

    fn value_of(&self, raw: &str) -> Result<Value>;

    fn string_of(&self, value: &Value) -> Result<String>;
}

fn mismatch(type_name: &str, value: &Value) -> ProptreeError {
    ProptreeError::format(
        type_name,
        &value.to_string(),
        format!("can't render a {} payload", value.type_label()),
    )
}

fn parse_number<T: FromStr>(type_name: &str, raw: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ProptreeError::format(type_name, raw, e.to_string()))
}

/// Items are kept verbatim, blanks and empty items included, so rendering
/// joins them back to the same text. Only the empty string is no items.
fn split_items(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(ITEM_SEPARATOR)
        .filter(move |_| !raw.is_empty())
        .map(str::to_string)
}

macro_rules! scalar_type {
    ($(#[$doc:meta])* $name:ident, $label:literal, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl ValueType for $name {
            fn name(&self) -> &str {
                $label
            }

            fn value_of(&self, raw: &str) -> Result<Value> {
                parse_number::<$ty>($label, raw).map(Value::$variant)
            }

            fn string_of(&self, value: &Value) -> Result<String> {
                match value {
                    Value::$variant(v) => Ok(v.to_string()),
                    other => Err(mismatch($label, other)),
                }
            }
        }
    };
}

scalar_type!(
    /// 32-bit signed integers.
    IntegerType, "integer", Integer, i32
);
scalar_type!(
    /// 64-bit signed integers.
    LongType, "long", Long, i64
);
scalar_type!(FloatType, "float", Float, f32);
scalar_type!(DoubleType, "double", Double, f64);
scalar_type!(
    /// Only the literals `true` and `false` are accepted.
    BooleanType, "boolean", Boolean, bool
);

/// Text, passed through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringType;

impl ValueType for StringType {
    fn name(&self) -> &str {
        "string"
    }

    fn value_of(&self, raw: &str) -> Result<Value> {
        Ok(Value::String(raw.to_string()))
    }

    fn string_of(&self, value: &Value) -> Result<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

/// Comma-separated, ordered strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListType;

impl ValueType for ListType {
    fn name(&self) -> &str {
        "list"
    }

    fn value_of(&self, raw: &str) -> Result<Value> {
        Ok(Value::List(split_items(raw).collect()))
    }

    fn string_of(&self, value: &Value) -> Result<String> {
        match value {
            Value::List(items) => Ok(items.join(",")),
            other => Err(mismatch("list", other)),
        }
    }
}

/// Comma-separated, unordered unique strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetType;

impl ValueType for SetType {
    fn name(&self) -> &str {
        "set"
    }

    fn value_of(&self, raw: &str) -> Result<Value> {
        Ok(Value::Set(split_items(raw).collect::<HashSet<_>>()))
    }

    fn string_of(&self, value: &Value) -> Result<String> {
        match value {
            Value::Set(_) => Ok(value.to_string()),
            other => Err(mismatch("set", other)),
        }
    }
}

/// `key:value` pairs separated by commas. Keys must be unique.
#[derive(Debug, Default, Clone, Copy)]
pub struct DictionaryType;

impl ValueType for DictionaryType {
    fn name(&self) -> &str {
        "dict"
    }

    fn value_of(&self, raw: &str) -> Result<Value> {
        let mut map = HashMap::new();
        for pair in split_items(raw) {
            let parts: Vec<&str> = pair.split(KEY_VALUE_SEPARATOR).collect();
            let [key, value] = parts.as_slice() else {
                return Err(ProptreeError::format(
                    "dict",
                    raw,
                    format!("pair '{pair}' is not in 'key:value' form"),
                ));
            };
            let key = key.trim();
            if map.contains_key(key) {
                return Err(ProptreeError::format(
                    "dict",
                    raw,
                    format!("duplicate key '{key}'"),
                ));
            }
            map.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Value::Dictionary(map))
    }

    fn string_of(&self, value: &Value) -> Result<String> {
        match value {
            Value::Dictionary(_) => Ok(value.to_string()),
            other => Err(mismatch("dict", other)),
        }
    }
}
