//! The flow-graph data model.
//!
//! Pointers on node inputs are the only representation of an edge. Derived
//! indices (consumer lists, compute order, externals) live in
//! [`CompiledGraph`](crate::compiler::CompiledGraph) and are rebuilt from the
//! pointers, never stored here.

use crate::ast::{Value, ValueType};
use crate::error::ParseError;
use crate::expression::{self, ExpressionIO};
use crate::provider::PropertyTarget;
use serde::{Deserialize, Serialize};

mod document;
mod kind;

pub use document::Document;
pub use kind::NodeKind;

pub type NodeId = String;
pub type GraphId = String;
pub type PropertyId = String;
pub type LayerId = String;

/// A reference from an input to one output slot of a producer node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pointer {
    pub node_id: NodeId,
    pub output_index: usize,
}

impl Pointer {
    pub fn new(node_id: impl Into<NodeId>, output_index: usize) -> Self {
        Self {
            node_id: node_id.into(),
            output_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    pub name: String,
    pub value_type: ValueType,
    /// Literal fallback used while no pointer is set.
    pub value: Value,
    #[serde(default)]
    pub pointer: Option<Pointer>,
}

impl Input {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            value: value_type.default_value(),
            pointer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub name: String,
    pub value_type: ValueType,
}

impl Output {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl FlowNode {
    /// Creates a node with the default ports of `kind`.
    ///
    /// Property and expression nodes derive their ports from external data;
    /// prefer [`FlowNode::property_input`], [`FlowNode::property_output`] and
    /// [`FlowNode::expression`] for those.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        let (inputs, outputs) = kind.default_ports();
        Self {
            id: id.into(),
            kind,
            inputs,
            outputs,
        }
    }

    /// Creates an expression node whose ports follow the inferred IO of `source`.
    pub fn expression(id: impl Into<NodeId>, source: &str) -> Result<Self, ParseError> {
        let io = expression::analyze(source)?;
        let mut node = Self::new(
            id,
            NodeKind::Expression {
                source: source.to_string(),
            },
        );
        node.apply_expression_io(&io);
        Ok(node)
    }

    /// Creates a node reading `property_id`, one port per resolved member.
    pub fn property_input(
        id: impl Into<NodeId>,
        property_id: impl Into<PropertyId>,
        target: &PropertyTarget,
    ) -> Self {
        Self::property_node(
            id.into(),
            NodeKind::PropertyInput {
                property_id: property_id.into(),
            },
            target,
        )
    }

    /// Creates a node writing `property_id`, one port per resolved member.
    pub fn property_output(
        id: impl Into<NodeId>,
        property_id: impl Into<PropertyId>,
        target: &PropertyTarget,
    ) -> Self {
        Self::property_node(
            id.into(),
            NodeKind::PropertyOutput {
                property_id: property_id.into(),
            },
            target,
        )
    }

    fn property_node(id: NodeId, kind: NodeKind, target: &PropertyTarget) -> Self {
        let members = target.members();
        Self {
            id,
            kind,
            inputs: members
                .iter()
                .map(|m| Input::new(m.clone(), ValueType::Any))
                .collect(),
            outputs: members
                .iter()
                .map(|m| Output::new(m.clone(), ValueType::Any))
                .collect(),
        }
    }

    /// Sets the literal of input `index`. Out-of-range indices are ignored.
    pub fn with_literal(mut self, index: usize, value: impl Into<Value>) -> Self {
        if let Some(input) = self.inputs.get_mut(index) {
            input.value = value.into();
        }
        self
    }

    /// Points input `index` at `output_index` of `producer`.
    pub fn with_pointer(
        mut self,
        index: usize,
        producer: impl Into<NodeId>,
        output_index: usize,
    ) -> Self {
        if let Some(input) = self.inputs.get_mut(index) {
            input.pointer = Some(Pointer::new(producer, output_index));
        }
        self
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name == name)
    }

    /// Iterates `(input_index, pointer)` for every wired input.
    pub fn pointers(&self) -> impl Iterator<Item = (usize, &Pointer)> {
        self.inputs
            .iter()
            .enumerate()
            .filter_map(|(i, input)| input.pointer.as_ref().map(|p| (i, p)))
    }

    /// Rebuilds the ports of an expression node from `io`. Inputs whose name
    /// survives keep their literal and pointer.
    pub(crate) fn apply_expression_io(&mut self, io: &ExpressionIO) {
        let previous = std::mem::take(&mut self.inputs);
        self.inputs = io
            .inputs
            .iter()
            .map(|name| {
                previous
                    .iter()
                    .find(|i| &i.name == name)
                    .cloned()
                    .unwrap_or_else(|| Input::new(name.clone(), ValueType::Any))
            })
            .collect();
        self.outputs = io
            .outputs
            .iter()
            .map(|name| Output::new(name.clone(), ValueType::Any))
            .collect();
    }
}

/// What a flow graph is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphKind {
    /// An ordinary graph evaluated once per pass for its layer.
    #[serde(rename_all = "camelCase")]
    Layer { layer_id: LayerId },
    /// A graph bound to one property, re-evaluated per repeated instance.
    #[serde(rename_all = "camelCase")]
    ArrayModifier {
        layer_id: LayerId,
        property_id: PropertyId,
    },
}

impl GraphKind {
    pub fn layer_id(&self) -> &str {
        match self {
            GraphKind::Layer { layer_id } | GraphKind::ArrayModifier { layer_id, .. } => layer_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowGraph {
    pub id: GraphId,
    pub kind: GraphKind,
    /// Ordered member nodes; the compiler seeds its traversal in this order.
    pub node_ids: Vec<NodeId>,
}

impl FlowGraph {
    pub fn new(id: impl Into<GraphId>, kind: GraphKind) -> Self {
        Self {
            id: id.into(),
            kind,
            node_ids: Vec::new(),
        }
    }

    pub fn layer(id: impl Into<GraphId>, layer_id: impl Into<LayerId>) -> Self {
        Self::new(
            id,
            GraphKind::Layer {
                layer_id: layer_id.into(),
            },
        )
    }

    pub fn array_modifier(
        id: impl Into<GraphId>,
        layer_id: impl Into<LayerId>,
        property_id: impl Into<PropertyId>,
    ) -> Self {
        Self::new(
            id,
            GraphKind::ArrayModifier {
                layer_id: layer_id.into(),
                property_id: property_id.into(),
            },
        )
    }

    pub fn layer_id(&self) -> &str {
        self.kind.layer_id()
    }

    /// The owning property of an array-modifier graph.
    pub fn array_property(&self) -> Option<&str> {
        match &self.kind {
            GraphKind::ArrayModifier { property_id, .. } => Some(property_id),
            GraphKind::Layer { .. } => None,
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.node_ids.iter().any(|id| id == node_id)
    }
}
