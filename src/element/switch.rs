use std::fmt;
use std::sync::Arc;

use crate::context::ContextMap;
use crate::error::Result;
use crate::expr::Expression;
use crate::value::{TypedValue, Value};

/// When a [`Condition`] applies.
#[derive(Clone)]
pub enum Guard {
    When(Arc<dyn Expression>),
    /// Unconditional fallback.
    Else,
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::When(expression) => f.debug_tuple("When").field(&expression.source()).finish(),
            Guard::Else => f.write_str("Else"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub guard: Guard,
    pub value: TypedValue,
}

impl Condition {
    pub fn when(expression: Arc<dyn Expression>, value: TypedValue) -> Self {
        Self {
            guard: Guard::When(expression),
            value,
        }
    }

    pub fn otherwise(value: TypedValue) -> Self {
        Self {
            guard: Guard::Else,
            value,
        }
    }
}

/// A value chosen by the first guard that holds under the call context.
#[derive(Debug)]
pub struct SwitchElement {
    name: String,
    description: Option<String>,
    conditions: Vec<Condition>,
}

impl SwitchElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            conditions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Walk the guards in order. The first `else` seen is kept as fallback and
    /// any later `else` is ignored. No match and no fallback yields `None`.
    pub fn evaluate(&self, ctx: &ContextMap) -> Result<Option<Value>> {
        let mut fallback: Option<&TypedValue> = None;
        for condition in &self.conditions {
            match &condition.guard {
                Guard::Else => {
                    fallback.get_or_insert(&condition.value);
                }
                Guard::When(expression) => {
                    if expression.test(ctx)? {
                        return Ok(Some(condition.value.value().clone()));
                    }
                }
            }
        }
        Ok(fallback.map(|typed| typed.value().clone()))
    }
}
