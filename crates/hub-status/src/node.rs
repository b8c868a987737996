//! Internal node representation

use hub_core::{StatusError, StatusResult, WILDCARD};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Leaf value without further structure
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    fn to_value(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Number(n) => Value::Number(n.clone()),
            Scalar::String(s) => Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Content {
    Scalar(Scalar),
    /// Ordered scalars; nested composites are not representable
    List(Vec<Scalar>),
    Container(BTreeMap<String, Node>),
}

/// A tree node and the revision of the last write through it
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub(crate) revision: u64,
    pub(crate) content: Content,
}

impl Node {
    pub(crate) fn container(revision: u64) -> Self {
        Self {
            revision,
            content: Content::Container(BTreeMap::new()),
        }
    }

    pub(crate) fn null(revision: u64) -> Self {
        Self {
            revision,
            content: Content::Scalar(Scalar::Null),
        }
    }

    pub(crate) fn children(&self) -> Option<&BTreeMap<String, Node>> {
        match &self.content {
            Content::Container(children) => Some(children),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match &mut self.content {
            Content::Container(children) => Some(children),
            _ => None,
        }
    }

    /// Convert a boundary value into a node stamped with `revision`
    ///
    /// Every node of the resulting subtree carries the same revision. `url`
    /// is only used for error messages.
    pub(crate) fn from_value(value: Value, revision: u64, url: &str) -> StatusResult<Self> {
        let content = match value {
            Value::Object(map) => {
                let mut children = BTreeMap::new();
                for (name, child) in map {
                    if !is_addressable(&name) {
                        let reason = format!("child name '{}' is not addressable", name);
                        return Err(unsupported(url, reason));
                    }
                    let child_url = join_url(url, &name);
                    let node = Node::from_value(child, revision, &child_url)?;
                    children.insert(name, node);
                }
                Content::Container(children)
            }
            Value::Array(items) => {
                let scalars = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        scalar(item).ok_or_else(|| {
                            unsupported(url, format!("list element {} is not a scalar", i))
                        })
                    })
                    .collect::<StatusResult<Vec<_>>>()?;
                Content::List(scalars)
            }
            other => match scalar(other) {
                Some(s) => Content::Scalar(s),
                None => return Err(unsupported(url, "unknown value type".to_string())),
            },
        };

        Ok(Self { revision, content })
    }

    /// Render this subtree in the boundary value model
    pub(crate) fn to_value(&self) -> Value {
        match &self.content {
            Content::Scalar(s) => s.to_value(),
            Content::List(items) => Value::Array(items.iter().map(Scalar::to_value).collect()),
            Content::Container(children) => {
                let map: Map<String, Value> = children
                    .iter()
                    .map(|(name, child)| (name.clone(), child.to_value()))
                    .collect();
                Value::Object(map)
            }
        }
    }
}

fn scalar(value: Value) -> Option<Scalar> {
    match value {
        Value::Null => Some(Scalar::Null),
        Value::Bool(b) => Some(Scalar::Bool(b)),
        Value::Number(n) => Some(Scalar::Number(n)),
        Value::String(s) => Some(Scalar::String(s)),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Child names must be reachable through a concrete address
fn is_addressable(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && name != WILDCARD
}

fn join_url(url: &str, name: &str) -> String {
    if url.ends_with("://") {
        format!("{}{}", url, name)
    } else {
        format!("{}/{}", url, name)
    }
}

fn unsupported(url: &str, reason: String) -> StatusError {
    StatusError::UnsupportedValue {
        url: url.to_string(),
        reason,
    }
}
