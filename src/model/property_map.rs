//! Properties and the ordered property map held by each node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{NodeId, PropertyType, Value};

/// Properties of a node keyed by name. Ordered so exports are deterministic.
pub type PropertyMap = BTreeMap<String, Property>;

/// Single- or multi-valued content of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValues {
    Single(Value),
    Multi(Vec<Value>),
}

impl PropertyValues {
    pub fn is_multi(&self) -> bool {
        matches!(self, PropertyValues::Multi(_))
    }

    pub fn as_slice(&self) -> &[Value] {
        match self {
            PropertyValues::Single(v) => std::slice::from_ref(v),
            PropertyValues::Multi(vs) => vs,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// A named, typed property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub kind: PropertyType,
    pub values: PropertyValues,
}

impl Property {
    pub fn single(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            kind: value.kind(),
            values: PropertyValues::Single(value),
        }
    }

    /// Multi-valued property; `kind` is explicit so empty lists stay typed.
    pub fn multi(name: impl Into<String>, kind: PropertyType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            values: PropertyValues::Multi(values),
        }
    }

    pub fn reference(name: impl Into<String>, target: NodeId) -> Self {
        Self::single(name, Value::Reference(target))
    }

    pub fn references(name: impl Into<String>, targets: impl IntoIterator<Item = NodeId>) -> Self {
        Self::multi(
            name,
            PropertyType::Reference,
            targets.into_iter().map(Value::Reference).collect(),
        )
    }

    pub fn is_multi(&self) -> bool {
        self.values.is_multi()
    }

    pub fn values(&self) -> &[Value] {
        self.values.as_slice()
    }

    /// Referenced identities, in value order. Empty for non-reference kinds.
    pub fn reference_targets(&self) -> Vec<NodeId> {
        if self.kind != PropertyType::Reference {
            return Vec::new();
        }
        self.values().iter().filter_map(Value::as_reference).collect()
    }
}
