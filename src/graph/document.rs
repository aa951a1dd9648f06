use super::{FlowGraph, FlowNode, GraphId, GraphKind, LayerId, NodeId, NodeKind, Pointer};
use crate::ast::Value;
use crate::error::EditError;
use crate::expression;
use ahash::AHashMap;
use itertools::Itertools;

/// The node arena plus every flow graph that partitions it.
///
/// Node ids are unique across the whole document so one arena can serve all
/// graphs. Every mutation returns the id of the graph it touched, which is the
/// graph whose compiled form is now stale.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: AHashMap<NodeId, FlowNode>,
    graphs: Vec<FlowGraph>,
    owners: AHashMap<NodeId, GraphId>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &AHashMap<NodeId, FlowNode> {
        &self.nodes
    }

    pub fn node(&self, node_id: &str) -> Option<&FlowNode> {
        self.nodes.get(node_id)
    }

    pub fn graph(&self, graph_id: &str) -> Option<&FlowGraph> {
        self.graphs.iter().find(|g| g.id == graph_id)
    }

    /// Graphs in insertion order.
    pub fn graphs(&self) -> impl Iterator<Item = &FlowGraph> {
        self.graphs.iter()
    }

    /// The graph `node_id` belongs to.
    pub fn graph_of(&self, node_id: &str) -> Option<&str> {
        self.owners.get(node_id).map(String::as_str)
    }

    pub fn layer_graphs<'a>(&'a self, layer_id: &'a str) -> impl Iterator<Item = &'a FlowGraph> {
        self.graphs.iter().filter(move |g| g.layer_id() == layer_id)
    }

    /// Every layer that owns at least one graph, in first-seen order.
    pub fn layers(&self) -> Vec<LayerId> {
        self.graphs
            .iter()
            .map(|g| g.layer_id().to_string())
            .unique()
            .collect()
    }

    pub fn add_graph(
        &mut self,
        graph_id: impl Into<GraphId>,
        kind: GraphKind,
    ) -> Result<GraphId, EditError> {
        let graph_id = graph_id.into();
        if self.graph(&graph_id).is_some() {
            return Err(EditError::DuplicateGraph(graph_id));
        }
        self.graphs.push(FlowGraph::new(graph_id.clone(), kind));
        Ok(graph_id)
    }

    /// Removes a graph together with all of its nodes.
    pub fn remove_graph(&mut self, graph_id: &str) -> Result<GraphId, EditError> {
        let position = self
            .graphs
            .iter()
            .position(|g| g.id == graph_id)
            .ok_or_else(|| EditError::GraphNotFound(graph_id.to_string()))?;
        let graph = self.graphs.remove(position);
        for node_id in &graph.node_ids {
            self.nodes.remove(node_id);
            self.owners.remove(node_id);
        }
        Ok(graph.id)
    }

    /// Adds `node` to a graph. Its pointers are taken as given and checked
    /// when the graph is compiled, so nodes may be added in any order.
    pub fn add_node(&mut self, graph_id: &str, node: FlowNode) -> Result<GraphId, EditError> {
        if self.nodes.contains_key(&node.id) {
            return Err(EditError::DuplicateNode(node.id));
        }
        let graph = self
            .graphs
            .iter_mut()
            .find(|g| g.id == graph_id)
            .ok_or_else(|| EditError::GraphNotFound(graph_id.to_string()))?;
        graph.node_ids.push(node.id.clone());
        self.owners.insert(node.id.clone(), graph.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(graph.id.clone())
    }

    /// Removes a node and detaches every pointer that referenced it.
    pub fn remove_node(&mut self, node_id: &str) -> Result<GraphId, EditError> {
        let graph_id = self.owner(node_id)?;
        self.nodes.remove(node_id);
        self.owners.remove(node_id);
        if let Some(graph) = self.graphs.iter_mut().find(|g| g.id == graph_id) {
            graph.node_ids.retain(|id| id != node_id);
            for id in &graph.node_ids {
                if let Some(consumer) = self.nodes.get_mut(id) {
                    for input in &mut consumer.inputs {
                        if input.pointer.as_ref().is_some_and(|p| p.node_id == node_id) {
                            input.pointer = None;
                        }
                    }
                }
            }
        }
        Ok(graph_id)
    }

    /// Wires input `input_index` of `node_id` to `pointer`. The producer must
    /// be a node of the same graph with an output at `pointer.output_index`.
    pub fn set_pointer(
        &mut self,
        node_id: &str,
        input_index: usize,
        pointer: Pointer,
    ) -> Result<GraphId, EditError> {
        let graph_id = self.owner(node_id)?;
        let producer = self
            .nodes
            .get(&pointer.node_id)
            .ok_or_else(|| EditError::NodeNotFound(pointer.node_id.clone()))?;
        if self.owners.get(&pointer.node_id) != Some(&graph_id) {
            return Err(EditError::ForeignProducer {
                node_id: node_id.to_string(),
                producer_id: pointer.node_id,
            });
        }
        if pointer.output_index >= producer.outputs.len() {
            return Err(EditError::OutputOutOfRange {
                producer_id: pointer.node_id,
                output_index: pointer.output_index,
            });
        }
        self.input_mut(node_id, input_index)?.pointer = Some(pointer);
        Ok(graph_id)
    }

    pub fn clear_pointer(&mut self, node_id: &str, input_index: usize) -> Result<GraphId, EditError> {
        let graph_id = self.owner(node_id)?;
        self.input_mut(node_id, input_index)?.pointer = None;
        Ok(graph_id)
    }

    pub fn set_literal(
        &mut self,
        node_id: &str,
        input_index: usize,
        value: impl Into<Value>,
    ) -> Result<GraphId, EditError> {
        let graph_id = self.owner(node_id)?;
        self.input_mut(node_id, input_index)?.value = value.into();
        Ok(graph_id)
    }

    /// Replaces the source of an expression node and rebuilds its ports from
    /// the inferred IO.
    ///
    /// Inputs whose name survives keep their literal and pointer. Consumers of
    /// an output whose name survives are re-pointed to its new index; consumers
    /// of a removed output are detached.
    pub fn set_expression(&mut self, node_id: &str, source: &str) -> Result<GraphId, EditError> {
        let graph_id = self.owner(node_id)?;
        let io = expression::analyze(source).map_err(|source| EditError::Expression {
            node_id: node_id.to_string(),
            source,
        })?;

        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| EditError::NodeNotFound(node_id.to_string()))?;
        let NodeKind::Expression { source: current } = &mut node.kind else {
            return Err(EditError::NotAnExpression(node_id.to_string()));
        };
        *current = source.to_string();
        let previous_outputs = node.outputs.iter().map(|o| o.name.clone()).collect_vec();
        node.apply_expression_io(&io);
        let remap = previous_outputs
            .iter()
            .map(|name| node.output_index(name))
            .collect_vec();

        if let Some(graph) = self.graphs.iter().find(|g| g.id == graph_id) {
            for id in &graph.node_ids {
                let Some(consumer) = self.nodes.get_mut(id) else {
                    continue;
                };
                for input in &mut consumer.inputs {
                    let Some(pointer) = input.pointer.as_mut() else {
                        continue;
                    };
                    if pointer.node_id != node_id {
                        continue;
                    }
                    match remap.get(pointer.output_index).copied().flatten() {
                        Some(index) => pointer.output_index = index,
                        None => input.pointer = None,
                    }
                }
            }
        }
        Ok(graph_id)
    }

    fn owner(&self, node_id: &str) -> Result<GraphId, EditError> {
        self.owners
            .get(node_id)
            .cloned()
            .ok_or_else(|| EditError::NodeNotFound(node_id.to_string()))
    }

    fn input_mut(
        &mut self,
        node_id: &str,
        input_index: usize,
    ) -> Result<&mut super::Input, EditError> {
        self.nodes
            .get_mut(node_id)
            .ok_or_else(|| EditError::NodeNotFound(node_id.to_string()))?
            .inputs
            .get_mut(input_index)
            .ok_or_else(|| EditError::InputOutOfRange {
                node_id: node_id.to_string(),
                input_index,
            })
    }
}
