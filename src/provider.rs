//! The narrow contract to the property/timeline system.

use crate::ast::Value;
use crate::graph::PropertyId;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;

/// How a property id resolves to concrete, individually valued members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyTarget {
    Scalar(PropertyId),
    /// A two-component property such as a position.
    Compound([PropertyId; 2]),
    Group(Vec<PropertyId>),
}

impl PropertyTarget {
    pub fn members(&self) -> Vec<PropertyId> {
        match self {
            PropertyTarget::Scalar(id) => vec![id.clone()],
            PropertyTarget::Compound(ids) => ids.to_vec(),
            PropertyTarget::Group(ids) => ids.clone(),
        }
    }
}

/// Read access to property values for one evaluation pass.
pub trait PropertyProvider: Send + Sync {
    fn property_value(&self, property_id: &str) -> Value;

    fn resolve_target(&self, property_id: &str) -> PropertyTarget;
}

/// A shape declared for a non-scalar property in [`StaticProperties`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "members", rename_all = "camelCase")]
pub enum PropertyShape {
    Compound([PropertyId; 2]),
    Group(Vec<PropertyId>),
}

/// An in-memory provider: property values plus the shapes of compound and
/// group properties. Unknown properties are scalars with a `Null` value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticProperties {
    #[serde(default)]
    pub values: AHashMap<PropertyId, Value>,
    #[serde(default)]
    pub shapes: AHashMap<PropertyId, PropertyShape>,
}

impl StaticProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a provider from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let properties = serde_json::from_str(&content)?;
        Ok(properties)
    }

    pub fn with_value(mut self, property_id: impl Into<PropertyId>, value: impl Into<Value>) -> Self {
        self.set_value(property_id, value);
        self
    }

    pub fn with_shape(mut self, property_id: impl Into<PropertyId>, shape: PropertyShape) -> Self {
        self.shapes.insert(property_id.into(), shape);
        self
    }

    pub fn set_value(&mut self, property_id: impl Into<PropertyId>, value: impl Into<Value>) {
        self.values.insert(property_id.into(), value.into());
    }
}

impl PropertyProvider for StaticProperties {
    fn property_value(&self, property_id: &str) -> Value {
        self.values.get(property_id).cloned().unwrap_or(Value::Null)
    }

    fn resolve_target(&self, property_id: &str) -> PropertyTarget {
        match self.shapes.get(property_id) {
            Some(PropertyShape::Compound(members)) => PropertyTarget::Compound(members.clone()),
            Some(PropertyShape::Group(members)) => PropertyTarget::Group(members.clone()),
            None => PropertyTarget::Scalar(property_id.to_string()),
        }
    }
}
