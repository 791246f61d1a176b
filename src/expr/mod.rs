//! Computed values: the expression interface used by expression elements and
//! switch guards, plus the built-in [`BasicEngine`].

mod basic;

use std::fmt;
use std::sync::Arc;

use crate::context::ContextMap;
use crate::error::Result;
use crate::value::Value;

pub use basic::BasicEngine;

/// A compiled expression.
pub trait Expression: Send + Sync + fmt::Debug {
    /// The text the expression was compiled from.
    fn source(&self) -> &str;

    /// Evaluate against `ctx`. `Ok(None)` is a null result.
    fn evaluate(&self, ctx: &ContextMap) -> Result<Option<Value>>;

    /// Evaluate and coerce the result with [`truthy`].
    fn test(&self, ctx: &ContextMap) -> Result<bool> {
        Ok(truthy(self.evaluate(ctx)?.as_ref()))
    }
}

/// Compiles expression text. Compilation failures surface when a source is
/// parsed, not when a value is read.
pub trait ExpressionEngine: Send + Sync + fmt::Debug {
    fn compile(&self, source: &str) -> Result<Arc<dyn Expression>>;
}

/// Boolean coercion for guard results: booleans as-is, numbers are true when
/// non-zero, any other non-null value is true, null is false.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::Boolean(b)) => *b,
        Some(other) => match other.as_f64() {
            Some(n) => n != 0.0,
            None => true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!truthy(None));
        assert!(truthy(Some(&Value::Boolean(true))));
        assert!(!truthy(Some(&Value::Boolean(false))));
        assert!(!truthy(Some(&Value::Integer(0))));
        assert!(truthy(Some(&Value::Long(-3))));
        assert!(!truthy(Some(&Value::Double(0.0))));
        assert!(truthy(Some(&Value::from(""))));
        assert!(truthy(Some(&Value::List(vec![]))));
    }
}
