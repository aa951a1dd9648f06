use super::{Input, Output, PropertyId};
use crate::ast::ValueType;
use serde::{Deserialize, Serialize};

/// The closed set of node operations. Kind-specific state lives in the variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Number,
    Add,
    Subtract,
    Multiply,
    Divide,
    DegreesToRadians,
    RadiansToDegrees,
    Clamp,
    Lerp,
    Vector2Compose,
    Vector2Decompose,
    Vector2Add,
    Vector2Lerp,
    RectTranslate,
    ColorCompose,
    ColorDecompose,
    HslToColor,
    /// Exposes the current frame index.
    Composition,
    /// Exposes the current instance index and count of an array modifier.
    ArrayModifierIndex,
    #[serde(rename_all = "camelCase")]
    PropertyInput { property_id: PropertyId },
    #[serde(rename_all = "camelCase")]
    PropertyOutput { property_id: PropertyId },
    Expression { source: String },
}

fn ports(
    inputs: &[(&str, ValueType)],
    outputs: &[(&str, ValueType)],
) -> (Vec<Input>, Vec<Output>) {
    (
        inputs.iter().map(|(n, t)| Input::new(*n, *t)).collect(),
        outputs.iter().map(|(n, t)| Output::new(*n, *t)).collect(),
    )
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Number => "number",
            NodeKind::Add => "add",
            NodeKind::Subtract => "subtract",
            NodeKind::Multiply => "multiply",
            NodeKind::Divide => "divide",
            NodeKind::DegreesToRadians => "degreesToRadians",
            NodeKind::RadiansToDegrees => "radiansToDegrees",
            NodeKind::Clamp => "clamp",
            NodeKind::Lerp => "lerp",
            NodeKind::Vector2Compose => "vector2Compose",
            NodeKind::Vector2Decompose => "vector2Decompose",
            NodeKind::Vector2Add => "vector2Add",
            NodeKind::Vector2Lerp => "vector2Lerp",
            NodeKind::RectTranslate => "rectTranslate",
            NodeKind::ColorCompose => "colorCompose",
            NodeKind::ColorDecompose => "colorDecompose",
            NodeKind::HslToColor => "hslToColor",
            NodeKind::Composition => "composition",
            NodeKind::ArrayModifierIndex => "arrayModifierIndex",
            NodeKind::PropertyInput { .. } => "propertyInput",
            NodeKind::PropertyOutput { .. } => "propertyOutput",
            NodeKind::Expression { .. } => "expression",
        }
    }

    /// The fixed ports of this kind. Property and expression nodes have none
    /// until their target or source is resolved.
    pub fn default_ports(&self) -> (Vec<Input>, Vec<Output>) {
        use ValueType::*;
        match self {
            NodeKind::Number => ports(&[("value", Number)], &[("value", Number)]),
            NodeKind::Add | NodeKind::Subtract | NodeKind::Multiply | NodeKind::Divide => {
                ports(&[("a", Number), ("b", Number)], &[("result", Number)])
            }
            NodeKind::DegreesToRadians => ports(&[("degrees", Number)], &[("radians", Number)]),
            NodeKind::RadiansToDegrees => ports(&[("radians", Number)], &[("degrees", Number)]),
            NodeKind::Clamp => ports(
                &[("value", Number), ("min", Number), ("max", Number)],
                &[("result", Number)],
            ),
            NodeKind::Lerp => ports(
                &[("a", Number), ("b", Number), ("t", Number)],
                &[("result", Number)],
            ),
            NodeKind::Vector2Compose => {
                ports(&[("x", Number), ("y", Number)], &[("vector", Vector2)])
            }
            NodeKind::Vector2Decompose => {
                ports(&[("vector", Vector2)], &[("x", Number), ("y", Number)])
            }
            NodeKind::Vector2Add => {
                ports(&[("a", Vector2), ("b", Vector2)], &[("result", Vector2)])
            }
            NodeKind::Vector2Lerp => ports(
                &[("a", Vector2), ("b", Vector2), ("t", Number)],
                &[("result", Vector2)],
            ),
            NodeKind::RectTranslate => {
                ports(&[("rect", Rect), ("offset", Vector2)], &[("rect", Rect)])
            }
            NodeKind::ColorCompose => ports(
                &[("r", Number), ("g", Number), ("b", Number), ("a", Number)],
                &[("color", Color)],
            ),
            NodeKind::ColorDecompose => ports(
                &[("color", Color)],
                &[("r", Number), ("g", Number), ("b", Number), ("a", Number)],
            ),
            NodeKind::HslToColor => ports(
                &[("h", Number), ("s", Number), ("l", Number), ("a", Number)],
                &[("color", Color)],
            ),
            NodeKind::Composition => ports(&[("frame", Number)], &[("frame", Number)]),
            NodeKind::ArrayModifierIndex => ports(
                &[("index", Number), ("count", Number)],
                &[("index", Number), ("count", Number)],
            ),
            NodeKind::PropertyInput { .. }
            | NodeKind::PropertyOutput { .. }
            | NodeKind::Expression { .. } => (Vec::new(), Vec::new()),
        }
    }

    /// The property a property-input or property-output node targets.
    pub fn property_id(&self) -> Option<&str> {
        match self {
            NodeKind::PropertyInput { property_id } | NodeKind::PropertyOutput { property_id } => {
                Some(property_id)
            }
            _ => None,
        }
    }
}
