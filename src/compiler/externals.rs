use crate::graph::{FlowGraph, FlowNode, NodeId, NodeKind, PropertyId};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;

/// Which compiled nodes consume each kind of external signal directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Externals {
    /// Owner property of an array-modifier graph to every node of that graph.
    pub array_modifier_count: AHashMap<PropertyId, AHashSet<NodeId>>,
    pub array_modifier_index: AHashSet<NodeId>,
    pub frame_index: AHashSet<NodeId>,
    /// Concrete member property id to the property-input nodes reading it.
    pub property_value: AHashMap<PropertyId, AHashSet<NodeId>>,
}

impl Externals {
    pub(super) fn index(
        graph: &FlowGraph,
        order: &[NodeId],
        nodes: &AHashMap<NodeId, FlowNode>,
        targets: &AHashMap<NodeId, Vec<PropertyId>>,
    ) -> Self {
        let mut externals = Externals::default();
        for id in order {
            let Some(node) = nodes.get(id) else { continue };
            match &node.kind {
                NodeKind::Composition => {
                    externals.frame_index.insert(id.clone());
                }
                NodeKind::ArrayModifierIndex => {
                    externals.array_modifier_index.insert(id.clone());
                }
                NodeKind::PropertyInput { .. } => {
                    for member in targets.get(id).into_iter().flatten() {
                        externals
                            .property_value
                            .entry(member.clone())
                            .or_default()
                            .insert(id.clone());
                    }
                }
                _ => {}
            }
        }
        if let Some(owner) = graph.array_property() {
            externals
                .array_modifier_count
                .insert(owner.to_string(), order.iter().cloned().collect());
        }
        externals
    }
}

/// The properties each node transitively writes.
///
/// Property-output nodes seed with the members behind their wired inputs;
/// every other node takes the union over its consumers. Walking the compute
/// order backwards sees every consumer before its producers.
pub(super) fn affected_externals(
    order: &[NodeId],
    nodes: &AHashMap<NodeId, FlowNode>,
    next: &AHashMap<NodeId, Vec<NodeId>>,
    targets: &AHashMap<NodeId, Vec<PropertyId>>,
) -> AHashMap<NodeId, BTreeSet<PropertyId>> {
    let mut affected: AHashMap<NodeId, BTreeSet<PropertyId>> = AHashMap::new();
    for id in order.iter().rev() {
        let mut written = BTreeSet::new();
        let output_node = nodes
            .get(id)
            .filter(|node| matches!(node.kind, NodeKind::PropertyOutput { .. }));
        if let Some(node) = output_node {
            let members = targets.get(id).map(Vec::as_slice).unwrap_or_default();
            for (input, member) in node.inputs.iter().zip(members) {
                if input.pointer.is_some() {
                    written.insert(member.clone());
                }
            }
        }
        for consumer in next.get(id).into_iter().flatten() {
            if let Some(downstream) = affected.get(consumer) {
                written.extend(downstream.iter().cloned());
            }
        }
        affected.insert(id.clone(), written);
    }
    affected
}
