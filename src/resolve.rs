//! Path resolution and element evaluation.
//!
//! Operates on an element tree with no I/O and no locking, so the whole walk
//! runs against one configuration snapshot. Steps for `resolve`:
//!
//! 1. Reject structurally invalid paths (no segments, or an empty segment)
//! 2. Descend through container elements (sets, pojos) for every segment but the last
//! 3. Fetch the terminal element by name
//! 4. Evaluate it against the context
//!
//! A missing element or a non-container in the middle of the path yields
//! `None`. Include fallback happens one level up, in
//! [`Configuration`](crate::Configuration).

use crate::context::ContextMap;
use crate::element::{Element, ElementContainer, Elements};
use crate::error::{ProptreeError, Result};
use crate::path::Path;
use crate::types::PojoPolicy;
use crate::value::Value;

/// Find the element at `path` below `container`.
pub fn locate<'a>(container: &'a Elements, path: &Path) -> Result<Option<&'a Element>> {
    check_path(path)?;
    let Some((last, parents)) = path.segments().split_last() else {
        return Ok(None);
    };
    let mut current = container;
    for segment in parents {
        match current.get(segment).and_then(Element::as_container) {
            Some(children) => current = children,
            None => return Ok(None),
        }
    }
    Ok(current.get(last))
}

/// Locate and evaluate the element at `path`.
pub fn resolve(
    ctx: &ContextMap,
    container: &Elements,
    path: &Path,
    policy: PojoPolicy,
) -> Result<Option<Value>> {
    match locate(container, path)? {
        Some(element) => evaluate(element, ctx, policy),
        None => Ok(None),
    }
}

/// Evaluate one element.
///
/// Only the element itself sees `ctx`. Children of sets and pojos are
/// evaluated with the empty context.
pub fn evaluate(element: &Element, ctx: &ContextMap, policy: PojoPolicy) -> Result<Option<Value>> {
    match element {
        Element::Property(property) => Ok(Some(property.value().value().clone())),
        Element::Expression(expression) => expression.expression().evaluate(ctx),
        Element::Switch(switch) => switch.evaluate(ctx),
        Element::Set(set) => aggregate(set.elements(), policy).map(Some),
        Element::Pojo(pojo) => pojo.instantiate(policy).map(|object| Some(Value::Object(object))),
        Element::Reference(_) | Element::Metadata(_) => Ok(None),
    }
}

/// Children that evaluate to nothing are left out of the aggregate.
fn aggregate(elements: &Elements, policy: PojoPolicy) -> Result<Value> {
    let mut values = Vec::with_capacity(elements.len());
    for child in elements.iter() {
        if let Some(value) = evaluate(child, ContextMap::empty(), policy)? {
            values.push(value);
        }
    }
    Ok(Value::aggregate(values))
}

fn check_path(path: &Path) -> Result<()> {
    if path.is_empty() {
        return Err(ProptreeError::ValueAccess("path is empty".into()));
    }
    if path.segments().iter().any(String::is_empty) {
        return Err(ProptreeError::ValueAccess(format!(
            "path '{path}' has an empty segment"
        )));
    }
    Ok(())
}
