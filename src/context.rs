use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::value::Value;

static EMPTY: Lazy<ContextMap> = Lazy::new(ContextMap::new);

/// Variables supplied per call to parameterize expressions and switch guards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextMap {
    vars: HashMap<String, Value>,
}

impl ContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared empty context for calls that supply none. It can't be mutated.
    pub fn empty() -> &'static ContextMap {
        &EMPTY
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a variable, returning the previous value if any.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.vars.insert(key.to_string(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.vars.remove(key)
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = (String, Value)>) {
        self.vars.extend(other);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Build a context from raw `name=value` text pairs (CLI flags, env-style
    /// input), typing each value with [`parse_context_value`].
    pub fn from_raw_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), parse_context_value(v.as_ref())))
            .collect()
    }
}

impl FromIterator<(String, Value)> for ContextMap {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// Type a raw context value the way the expression language types literals:
/// a boolean, then an integer (`Integer` when it fits 32 bits, else `Long`),
/// then a decimal number (`Double`), otherwise the text itself.
pub fn parse_context_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    if let Ok(i) = s.parse::<i32>() {
        return Value::Integer(i);
    }
    if let Ok(l) = s.parse::<i64>() {
        return Value::Long(l);
    }
    if is_decimal(s)
        && let Ok(d) = s.parse::<f64>()
    {
        return Value::Double(d);
    }
    Value::String(s.to_string())
}

/// `[-+]digits.digits`, either side of the point may be empty but not both.
fn is_decimal(s: &str) -> bool {
    let unsigned = s.strip_prefix(['-', '+']).unwrap_or(s);
    let Some((whole, fraction)) = unsigned.split_once('.') else {
        return false;
    };
    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}
